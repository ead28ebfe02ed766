use chrono::{DateTime, Duration, Utc};
use dl_core::pacing::{self, Pacing};
use dl_core::{Article, Config, Result};
use tracing::{info, warn};

use crate::sources::perplexity::PerplexitySource;
use crate::sources::rss::RssSource;
use crate::sources::ArticleSource;

/// Primary search source with a per-topic fallback.
#[derive(Debug)]
pub struct ContentFetcher {
    primary: Option<Box<dyn ArticleSource>>,
    fallback: Box<dyn ArticleSource>,
    pacing: Pacing,
}

impl ContentFetcher {
    pub fn new(primary: Option<Box<dyn ArticleSource>>, fallback: Box<dyn ArticleSource>) -> Self {
        Self {
            primary,
            fallback,
            pacing: Pacing::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let primary = PerplexitySource::from_config(config)?
            .map(|source| Box::new(source) as Box<dyn ArticleSource>);
        Ok(Self::new(primary, Box::new(RssSource::new()?)))
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Articles for one topic. Never fails; the fallback covers primary
    /// errors and empty results.
    pub async fn fetch_topic(&self, topic: &str, max_articles: usize) -> Vec<Article> {
        let primary = match &self.primary {
            Some(source) => match source.fetch(topic, max_articles).await {
                Ok(articles) => articles,
                Err(e) => {
                    warn!(source = source.name(), topic, error = %e, "primary source failed");
                    Vec::new()
                }
            },
            None => {
                warn!(topic, "no search credential configured, skipping primary source");
                Vec::new()
            }
        };
        if !primary.is_empty() {
            return primary;
        }

        info!(topic, fallback = self.fallback.name(), "primary returned nothing, trying fallback");
        match self.fallback.fetch(topic, max_articles).await {
            Ok(mut articles) => {
                articles.truncate(max_articles);
                articles
            }
            Err(e) => {
                warn!(source = self.fallback.name(), topic, error = %e, "fallback source failed");
                Vec::new()
            }
        }
    }

    pub async fn fetch_content(&self, topics: &[String], max_articles_per_topic: usize) -> Vec<Article> {
        let mut all = Vec::new();

        for (i, topic) in topics.iter().enumerate() {
            info!(topic = %topic, "fetching content");
            all.extend(self.fetch_topic(topic, max_articles_per_topic).await);
            if i + 1 < topics.len() {
                pacing::pause(self.pacing.between_topics).await;
            }
        }

        info!(count = all.len(), "total articles fetched");
        all
    }
}

/// Keep articles published within the last `max_age_hours`, plus any whose
/// publication time is unknown.
pub fn filter_recent(articles: Vec<Article>, max_age_hours: u32) -> Vec<Article> {
    filter_recent_at(articles, max_age_hours, Utc::now())
}

/// [`filter_recent`] against a fixed "now". The cutoff is inclusive.
pub fn filter_recent_at(articles: Vec<Article>, max_age_hours: u32, now: DateTime<Utc>) -> Vec<Article> {
    let cutoff = now - Duration::hours(i64::from(max_age_hours));
    let total = articles.len();
    let recent: Vec<Article> = articles
        .into_iter()
        .filter(|article| article.published_at.map_or(true, |published| published >= cutoff))
        .collect();

    info!(kept = recent.len(), total, max_age_hours, "filtered to recent articles");
    recent
}
