use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dl_core::{Article, Error, Result};
use reqwest::Client;
use tracing::{info, warn};

use super::utils::html_to_text;
use super::ArticleSource;

pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Built-in topic to feed table.
pub fn default_feeds() -> HashMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 4] = [
        (
            "artificial intelligence",
            &[
                "https://feeds.feedburner.com/oreilly/radar",
                "https://machinelearningmastery.com/feed/",
            ],
        ),
        (
            "machine learning",
            &["https://machinelearningmastery.com/feed/", "https://distill.pub/rss.xml"],
        ),
        (
            "software development",
            &["https://feeds.feedburner.com/oreilly/radar", "https://dev.to/feed"],
        ),
        (
            "data science",
            &[
                "https://towardsdatascience.com/feed",
                "https://www.kdnuggets.com/feed",
            ],
        ),
    ];
    table
        .iter()
        .map(|(topic, feeds)| (topic.to_string(), feeds.iter().map(|f| f.to_string()).collect()))
        .collect()
}

/// Fallback source reading RSS 2.0 feeds. Never fails: feed errors are
/// logged and the feed is skipped.
#[derive(Debug, Clone)]
pub struct RssSource {
    client: Client,
    feeds: HashMap<String, Vec<String>>,
}

impl RssSource {
    pub fn new() -> Result<Self> {
        Self::with_feeds(default_feeds())
    }

    pub fn with_feeds(feeds: HashMap<String, Vec<String>>) -> Result<Self> {
        let client = Client::builder().timeout(FEED_TIMEOUT).build()?;
        let feeds = feeds
            .into_iter()
            .map(|(topic, urls)| (normalize_topic(&topic), urls))
            .collect();
        Ok(Self { client, feeds })
    }

    pub fn feeds_for(&self, topic: &str) -> &[String] {
        self.feeds
            .get(&normalize_topic(topic))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    async fn fetch_channel(&self, url: &str) -> Result<rss::Channel> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                provider: "rss",
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let bytes = response.bytes().await?;
        rss::Channel::read_from(Cursor::new(bytes.to_vec()))
            .map_err(|e| Error::Search(format!("invalid feed {}: {}", url, e)))
    }
}

fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

fn article_from_item(item: &rss::Item, channel_title: &str, topic: &str) -> Option<Article> {
    let title = item.title()?.trim();
    let url = item.link()?.trim();
    if title.is_empty() || url.is_empty() {
        return None;
    }
    let published_at = item
        .pub_date()
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(Article {
        title: title.to_string(),
        url: url.to_string(),
        content: item.description().map(html_to_text).unwrap_or_default(),
        source: channel_title.to_string(),
        published_at,
        topic: topic.to_string(),
    })
}

#[async_trait]
impl ArticleSource for RssSource {
    fn name(&self) -> &str {
        "rss"
    }

    async fn fetch(&self, topic: &str, max_articles: usize) -> Result<Vec<Article>> {
        info!(topic, "using RSS fallback");
        let mut articles = Vec::new();
        let mut seen = HashSet::new();

        for url in self.feeds_for(topic) {
            if articles.len() >= max_articles {
                break;
            }
            let channel = match self.fetch_channel(url).await {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(feed = %url, error = %e, "failed to fetch feed");
                    continue;
                }
            };
            for item in channel.items() {
                if articles.len() >= max_articles {
                    break;
                }
                if let Some(article) = article_from_item(item, channel.title(), topic) {
                    if seen.insert(article.url.clone()) {
                        articles.push(article);
                    }
                }
            }
        }

        info!(topic, count = articles.len(), "fetched articles from feeds");
        Ok(articles)
    }
}
