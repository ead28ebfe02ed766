use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dl_core::{Article, Pacing, RateLimiter};
use dl_fetcher::{ArticleSource, ContentFetcher, PerplexitySource};
use dl_inference::{MaterialGenerator, ScriptedModel, Summarizer};
use dl_pipeline::{LearningPipeline, RunSettings};
use dl_storage::{LearningDatabase, MemoryDatabase};

fn search_block(slug: &str, hours_old: i64) -> String {
    format!(
        "**Title:** {slug}\n**URL:** https://example.com/{slug}\n**Summary:** An article about {slug}.\n\
         **Source:** Example Weekly\n**Date:** {}\n\n",
        (Utc::now() - Duration::hours(hours_old)).to_rfc3339()
    )
}

/// Fallback that finds nothing and remembers which topics it was asked for.
#[derive(Debug, Clone, Default)]
struct RecordingFallback {
    topics: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ArticleSource for RecordingFallback {
    fn name(&self) -> &str {
        "recording"
    }

    async fn fetch(&self, topic: &str, _max_articles: usize) -> dl_core::Result<Vec<Article>> {
        self.topics.lock().unwrap().push(topic.to_string());
        Ok(Vec::new())
    }
}

fn summary_reply(text: &str) -> String {
    format!(
        "```json\n{{\"summary\": \"{text}\", \"key_points\": [\"one\", \"two\", \"three\"], \
         \"learning_objectives\": [\"understand {text}\"]}}\n```"
    )
}

const QUIZ_REPLY: &str = r#"{"questions": [{"question": "What does ownership prevent?", "type": "multiple_choice",
    "options": ["A) Data races", "B) Typos", "C) Slow builds", "D) Nothing"], "correct_answer": "A) Data races",
    "explanation": "Aliasing rules rule them out.", "difficulty": "medium"}]}"#;

const FLASHCARD_REPLY: &str = r#"{"flashcards": [{"question": "What is a lifetime?", "answer": "A scope for which a reference is valid",
    "category": "", "difficulty": "easy"}]}"#;

#[tokio::test]
async fn two_topics_through_to_a_minimal_database() {
    let search = Arc::new(
        ScriptedModel::new("search")
            .reply("I could not find any recent articles on that topic.")
            .reply(format!(
                "{}{}{}",
                search_block("ownership", 2),
                search_block("async-traits", 10),
                search_block("editions", 96)
            )),
    );
    let fallback = RecordingFallback::default();
    let fetcher = ContentFetcher::new(
        Some(Box::new(PerplexitySource::new(search.clone(), 0)) as Box<dyn ArticleSource>),
        Box::new(fallback.clone()),
    )
    .with_pacing(Pacing::none());

    let summarizer_model = Arc::new(
        ScriptedModel::new("summarizer")
            .reply(summary_reply("Ownership moves values."))
            .reply(summary_reply("Async functions in traits.")),
    );
    let generator_model = Arc::new(
        ScriptedModel::new("generator")
            .reply(QUIZ_REPLY)
            .reply(FLASHCARD_REPLY)
            .reply(QUIZ_REPLY)
            .reply(FLASHCARD_REPLY),
    );

    let db = Arc::new(MemoryDatabase::with_properties(
        "Learning",
        &[("Title", "title"), ("Summary", "rich_text")],
    ));
    let database = LearningDatabase::new(db.clone())
        .with_rate_limiter(RateLimiter::unlimited())
        .with_pacing(Pacing::none());

    let pipeline = LearningPipeline::new(
        fetcher,
        Summarizer::new(summarizer_model.clone())
            .with_rate_limiter(RateLimiter::unlimited())
            .with_pacing(Pacing::none()),
        MaterialGenerator::new(generator_model.clone())
            .with_rate_limiter(RateLimiter::unlimited())
            .with_pacing(Pacing::none()),
        Some(database),
        RunSettings {
            content_max_age_hours: 48,
            ..RunSettings::default()
        },
    );

    let topics = vec!["quantum computing".to_string(), "rust".to_string()];
    let report = pipeline.run(Some(&topics)).await.unwrap();

    assert_eq!(search.requests().len(), 2);
    assert_eq!(*fallback.topics.lock().unwrap(), vec!["quantum computing".to_string()]);
    assert_eq!(report.articles_fetched, 3);
    assert_eq!(report.recent_articles, 2);
    assert_eq!(report.summaries, 2);
    assert_eq!(report.materials, 2);
    assert_eq!(report.created.len(), 2);
    assert!(!report.wrote_nothing());
    assert_eq!(summarizer_model.remaining(), 0);
    assert_eq!(generator_model.remaining(), 0);

    let pages = db.pages().await;
    assert_eq!(pages.len(), 2);
    for page in &pages {
        let keys: Vec<_> = page.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Summary", "Title"]);
    }
    assert_eq!(
        pages[0].properties["Title"]["title"][0]["text"]["content"],
        "ownership"
    );
    assert_eq!(
        pages[1].properties["Summary"]["rich_text"][0]["text"]["content"],
        "Async functions in traits."
    );

    let stats = pipeline.database().unwrap().get_stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert!(stats.topics.is_empty());
    assert_eq!(stats.statuses["Unknown"], 2);
}
