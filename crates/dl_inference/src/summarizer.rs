use std::sync::Arc;
use std::time::Duration;

use dl_core::pacing::{self, Pacing};
use dl_core::{Article, ChatModel, ChatRequest, RateLimiter, Summary};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::parse::{extract_json, string_list, truncate_chars};

const SYSTEM_PROMPT: &str = "You are an expert educational content curator who creates concise, valuable summaries for learners.";
const FALLBACK_SUMMARY_CHARS: usize = 500;
const EDUCATIONAL_KEYWORDS: [&str; 7] = [
    "learn",
    "understand",
    "concept",
    "method",
    "technique",
    "principle",
    "skill",
];

/// Turns articles into learner-oriented summaries, one chat call each.
#[derive(Debug)]
pub struct Summarizer {
    model: Arc<dyn ChatModel>,
    limiter: RateLimiter,
    pacing: Pacing,
}

impl Summarizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            limiter: RateLimiter::new(Duration::from_secs(1)),
            pacing: Pacing::default(),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn build_prompt(article: &Article, sentence_count: u32) -> String {
        format!(
            "You are an educational content curator. Summarize the latest development in the last 7 days about {topic} \
in exactly {n} sentences that capture the most important learning points. Focus on actionable insights and key \
concepts that would be valuable for someone learning about {topic}. Make it concise but comprehensive.

Title: {title}
Source: {source}
Content: {content}

Please provide:
1. A {n}-sentence summary
2. 3-5 key points as bullet points
3. 2-3 clear learning objectives

Format your response as JSON with the following structure:
{{
    \"summary\": \"Your {n}-sentence summary here\",
    \"key_points\": [\"Key point 1\", \"Key point 2\", \"Key point 3\"],
    \"learning_objectives\": [\"Learning objective 1\", \"Learning objective 2\"]
}}",
            topic = article.topic,
            n = sentence_count,
            title = article.title,
            source = article.source,
            content = article.content,
        )
    }

    /// Summarize one article. Returns `None` only when the provider call
    /// itself fails; unparsable output still produces a summary.
    pub async fn summarize(&self, article: &Article, sentence_count: u32) -> Option<Summary> {
        self.limiter.wait().await;

        let request = ChatRequest::new(SYSTEM_PROMPT, Self::build_prompt(article, sentence_count))
            .with_temperature(0.3)
            .with_max_tokens(500);

        match self.model.complete(&request).await {
            Ok(response) => {
                let summary = parse_summary(article, &response);
                info!(title = %truncate_chars(&article.title, 50), "summarized article");
                Some(summary)
            }
            Err(e) => {
                warn!(error = %e, title = %article.title, "failed to summarize article");
                None
            }
        }
    }

    pub async fn summarize_batch(&self, articles: &[Article], sentence_count: u32) -> Vec<Summary> {
        let mut summaries = Vec::with_capacity(articles.len());

        for (i, article) in articles.iter().enumerate() {
            info!(
                index = i + 1,
                total = articles.len(),
                title = %truncate_chars(&article.title, 50),
                "summarizing article"
            );
            if let Some(summary) = self.summarize(article, sentence_count).await {
                summaries.push(summary);
            }
            if i + 1 < articles.len() {
                pacing::pause(self.pacing.between_summaries).await;
            }
        }

        info!(succeeded = summaries.len(), total = articles.len(), "summary batch finished");
        summaries
    }

    /// Advisory score in `0.0..=1.0`; never used to reject a summary.
    pub fn quality_score(summary: &Summary) -> f64 {
        let mut score = 0.0;

        if (100..=800).contains(&summary.summary.chars().count()) {
            score += 0.3;
        }
        if summary.key_points.len() >= 3 {
            score += 0.3;
        }
        if summary.learning_objectives.len() >= 2 {
            score += 0.2;
        }

        let lower = summary.summary.to_lowercase();
        let hits = EDUCATIONAL_KEYWORDS
            .iter()
            .filter(|keyword| lower.contains(*keyword))
            .count();
        score += (hits as f64 * 0.05).min(0.2);

        score.min(1.0)
    }
}

/// Fenced JSON, then raw JSON, then the first 500 characters of the text.
pub fn parse_summary(article: &Article, response: &str) -> Summary {
    match extract_json(response) {
        Some(Value::Object(fields)) => Summary {
            article: article.clone(),
            summary: fields
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            key_points: string_list(fields.get("key_points")),
            learning_objectives: string_list(fields.get("learning_objectives")),
        },
        _ => {
            debug!(title = %article.title, "summary response is not JSON, keeping raw text");
            Summary {
                article: article.clone(),
                summary: truncate_chars(response, FALLBACK_SUMMARY_CHARS),
                key_points: Vec::new(),
                learning_objectives: Vec::new(),
            }
        }
    }
}
