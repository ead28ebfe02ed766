use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dl_core::{Article, ChatModel, ChatRequest, Config, RateLimiter, Result};
use dl_inference::OpenAiChatModel;
use tracing::{debug, info};

use super::utils::parse_published;
use super::ArticleSource;

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a content curator. Find recent, high-quality educational articles and return them in a structured format.";

/// Primary source: an online search model queried through the chat API.
#[derive(Debug)]
pub struct PerplexitySource {
    model: Arc<dyn ChatModel>,
    limiter: RateLimiter,
}

impl PerplexitySource {
    pub fn new(model: Arc<dyn ChatModel>, requests_per_minute: u32) -> Self {
        Self {
            model,
            limiter: RateLimiter::per_minute(requests_per_minute),
        }
    }

    /// `None` when no search credential is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(api_key) = config.perplexity_api_key.as_deref() else {
            return Ok(None);
        };
        let model = OpenAiChatModel::new(
            "perplexity",
            api_key,
            &config.perplexity_model,
            &config.perplexity_base_url,
            SEARCH_TIMEOUT,
        )?;
        Ok(Some(Self::new(Arc::new(model), config.api_rate_limit_per_minute)))
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn prompt(topic: &str, max_articles: usize) -> String {
        format!(
            "Find {max_articles} recent educational articles about {topic}. For each article, provide: title, URL, \
brief summary, source, and publication date if available. Focus on content from the last 48 hours.

List each article as labeled lines:
Title: ...
URL: ...
Summary: ...
Source: ...
Date: YYYY-MM-DD"
        )
    }
}

#[async_trait]
impl ArticleSource for PerplexitySource {
    fn name(&self) -> &str {
        "perplexity"
    }

    async fn fetch(&self, topic: &str, max_articles: usize) -> Result<Vec<Article>> {
        self.limiter.wait().await;

        let request = ChatRequest::new(SYSTEM_PROMPT, Self::prompt(topic, max_articles)).with_max_tokens(1500);
        let response = self.model.complete(&request).await?;

        let mut articles = parse_search_response(&response, topic);
        articles.truncate(max_articles);
        info!(topic, count = articles.len(), "fetched articles from search");
        Ok(articles)
    }
}

#[derive(Debug, Default)]
struct Block {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    source: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

impl Block {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none() && self.content.is_none() && self.source.is_none()
    }

    fn take_article(&mut self, topic: &str) -> Option<Article> {
        if self.title.is_none() || self.url.is_none() || self.content.is_none() || self.source.is_none() {
            return None;
        }
        let block = std::mem::take(self);
        Some(Article {
            title: block.title.unwrap_or_default(),
            url: block.url.unwrap_or_default(),
            content: block.content.unwrap_or_default(),
            source: block.source.unwrap_or_default(),
            published_at: block.published_at,
            topic: topic.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Title,
    Url,
    Summary,
    Source,
    Date,
}

fn classify(line: &str) -> Option<Label> {
    const LABELS: [(&str, Label); 6] = [
        ("Title", Label::Title),
        ("URL", Label::Url),
        ("Summary", Label::Summary),
        ("Source", Label::Source),
        ("Date", Label::Date),
        ("Published", Label::Date),
    ];
    LABELS.iter().find_map(|(name, label)| {
        let plain = line.starts_with(name) && line[name.len()..].starts_with(':');
        let bold = line.strip_prefix("**").is_some_and(|rest| rest.starts_with(name));
        (plain || bold).then_some(*label)
    })
}

/// Drops list markers such as `- `, `* ` or `3. ` in front of a label.
fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim_start();
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }
    line
}

fn value_of(line: &str) -> String {
    line.split_once(':')
        .map(|(_, value)| value)
        .unwrap_or_default()
        .trim_matches(|c: char| c.is_whitespace() || c == '*')
        .to_string()
}

/// Scan labeled lines into articles. A block becomes an article as soon as
/// title, URL, summary and source have all been seen; blocks missing any of
/// them are dropped.
pub fn parse_search_response(response: &str, topic: &str) -> Vec<Article> {
    let mut articles: Vec<Article> = Vec::new();
    let mut block = Block::default();

    for raw in response.lines() {
        let line = strip_list_marker(raw.trim());
        let Some(label) = classify(line) else {
            continue;
        };
        let value = value_of(line);

        match label {
            Label::Title => block.title = Some(value),
            Label::Url => block.url = Some(value),
            Label::Summary => block.content = Some(value),
            Label::Source => block.source = Some(value),
            Label::Date => {
                let published = parse_published(&value);
                match articles.last_mut() {
                    Some(last) if block.is_empty() && last.published_at.is_none() => {
                        last.published_at = published;
                    }
                    _ => block.published_at = published,
                }
            }
        }

        if let Some(article) = block.take_article(topic) {
            articles.push(article);
        }
    }

    if !block.is_empty() {
        debug!(topic, "dropping incomplete search result block");
    }
    articles
}
