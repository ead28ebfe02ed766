use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dl_core::pacing::{self, Pacing};
use dl_core::storage::{DatabaseApi, DateFilter, Page, PageQuery, Schema};
use dl_core::{Config, Error, LearningMaterials, RateLimiter, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backends::NotionDatabase;
use crate::format::{format_answers, format_bullets, format_flashcards, format_quiz_questions};
use crate::mapping::{
    assign, date_start, display_topic, full_schema, resolve, tag_names, Attribute, FieldValue, TITLE_LIMIT,
};

pub const DEFAULT_STATUS: &str = "New";
pub const DEFAULT_PRIORITY: &str = "Medium";
const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub total_entries: usize,
    pub topics: BTreeMap<String, usize>,
    pub statuses: BTreeMap<String, usize>,
    pub recent_entries: usize,
}

/// Writes learning materials into whatever schema the database declares.
#[derive(Debug)]
pub struct LearningDatabase {
    api: Arc<dyn DatabaseApi>,
    limiter: RateLimiter,
    pacing: Pacing,
}

impl LearningDatabase {
    pub fn new(api: Arc<dyn DatabaseApi>) -> Self {
        Self {
            api,
            limiter: RateLimiter::new(Duration::from_millis(300)),
            pacing: Pacing::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api = NotionDatabase::from_config(config)?;
        Ok(Self::new(Arc::new(api)).with_rate_limiter(RateLimiter::new(config.notion_min_interval)))
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Retrieve the database, log its title and properties, return the title.
    pub async fn verify_connection(&self) -> Result<String> {
        self.limiter.wait().await;
        let info = self.api.retrieve_database().await?;
        info!(database = %info.title, "connected to database");
        info!(properties = ?info.schema.keys().collect::<Vec<_>>(), "current database properties");
        for (name, ty) in &info.schema {
            debug!(property = %name, r#type = %ty, "database property");
        }
        Ok(info.title)
    }

    /// Add the full learning property set, select options included.
    pub async fn setup_schema(&self) -> Result<()> {
        self.limiter.wait().await;
        self.api.update_properties(&full_schema()).await?;
        info!("database schema updated");
        Ok(())
    }

    pub async fn get_schema(&self) -> Result<Schema> {
        self.limiter.wait().await;
        Ok(self.api.retrieve_database().await?.schema)
    }

    /// Property payload for one entry against a schema snapshot. Attributes
    /// with no compatible field are left out.
    pub fn build_properties(
        materials: &LearningMaterials,
        schema: &Schema,
        now: DateTime<Utc>,
    ) -> Map<String, Value> {
        let article = materials.article();
        let summary = &materials.summary;
        let quiz = format_quiz_questions(&materials.quiz_questions);
        let flashcards = format_flashcards(&materials.flashcards);
        let title: String = article.title.chars().take(TITLE_LIMIT).collect();

        let values = [
            (Attribute::Title, FieldValue::Text(title)),
            (Attribute::Topic, FieldValue::Text(display_topic(&article.topic).to_string())),
            (Attribute::Summary, FieldValue::Text(summary.summary.clone())),
            (Attribute::SourceUrl, FieldValue::Url(article.url.clone())),
            (Attribute::DateAdded, FieldValue::Date(now)),
            (Attribute::Status, FieldValue::Text(DEFAULT_STATUS.to_string())),
            (Attribute::Priority, FieldValue::Text(DEFAULT_PRIORITY.to_string())),
            (Attribute::Answers, FieldValue::Text(format_answers(&quiz, &flashcards))),
            (Attribute::QuizQuestions, FieldValue::Text(quiz)),
            (Attribute::Flashcards, FieldValue::Text(flashcards)),
            (Attribute::KeyPoints, FieldValue::Text(format_bullets(&summary.key_points))),
            (
                Attribute::LearningObjectives,
                FieldValue::Text(format_bullets(&summary.learning_objectives)),
            ),
        ];

        let mut properties = Map::new();
        for (attribute, value) in values {
            match assign(&mut properties, schema, attribute, value) {
                Some(field) => debug!(?attribute, field = %field, "mapped attribute"),
                None => debug!(?attribute, "no compatible field, skipping"),
            }
        }
        properties
    }

    /// Create one entry. Failures are logged and reported as `None`.
    pub async fn create_entry(&self, materials: &LearningMaterials) -> Option<String> {
        let title = &materials.article().title;
        match self.try_create_entry(materials).await {
            Ok(id) => {
                info!(page_id = %id, title = %title.chars().take(50).collect::<String>(), "created entry");
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, title = %title, "failed to create entry");
                None
            }
        }
    }

    async fn try_create_entry(&self, materials: &LearningMaterials) -> Result<String> {
        let schema = self.get_schema().await?;
        let properties = Self::build_properties(materials, &schema, Utc::now());
        debug!(properties = ?properties.keys().collect::<Vec<_>>(), "creating entry");

        self.limiter.wait().await;
        self.api.create_page(&properties).await
    }

    pub async fn batch_create(&self, materials: &[LearningMaterials]) -> Vec<String> {
        let mut created = Vec::with_capacity(materials.len());

        for (i, item) in materials.iter().enumerate() {
            info!(index = i + 1, total = materials.len(), "creating entry");
            if let Some(id) = self.create_entry(item).await {
                created.push(id);
            }
            if i + 1 < materials.len() {
                pacing::pause(self.pacing.between_writes).await;
            }
        }

        info!(created = created.len(), total = materials.len(), "batch write finished");
        created
    }

    async fn query_all(&self, mut query: PageQuery) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        loop {
            self.limiter.wait().await;
            let batch = self.api.query(&query).await?;
            pages.extend(batch.results);
            match batch.next_cursor {
                Some(cursor) => query.start_cursor = Some(cursor),
                None => break,
            }
        }
        Ok(pages)
    }

    /// Entries whose date field is within the last `days`, newest first.
    pub async fn query_recent(&self, days: u32) -> Vec<Page> {
        match self.try_query_recent(days).await {
            Ok(pages) => {
                info!(count = pages.len(), days, "found recent entries");
                pages
            }
            Err(e) => {
                warn!(error = %e, "failed to query recent entries");
                Vec::new()
            }
        }
    }

    async fn try_query_recent(&self, days: u32) -> Result<Vec<Page>> {
        let schema = self.get_schema().await?;
        let (field, _) = resolve(&schema, Attribute::DateAdded)
            .ok_or_else(|| Error::Database("database has no date property".to_string()))?;
        let query = PageQuery {
            date_after: Some(DateFilter {
                property: field.to_string(),
                after: Utc::now() - ChronoDuration::days(i64::from(days)),
            }),
            sort_descending_by: Some(field.to_string()),
            start_cursor: None,
        };
        self.query_all(query).await
    }

    pub async fn update_status(&self, page_id: &str, status: &str) -> Result<()> {
        let schema = self.get_schema().await?;
        let mut properties = Map::new();
        assign(&mut properties, &schema, Attribute::Status, FieldValue::Text(status.to_string()))
            .ok_or_else(|| Error::Database("database has no status property".to_string()))?;

        self.limiter.wait().await;
        self.api.update_page(page_id, &properties).await?;
        info!(page_id, status, "updated entry status");
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let schema = self.get_schema().await?;
        let topic_field = resolve(&schema, Attribute::Topic).map(|(name, _)| name.to_string());
        let status_field = resolve(&schema, Attribute::Status).map(|(name, _)| name.to_string());
        let date_field = resolve(&schema, Attribute::DateAdded).map(|(name, _)| name.to_string());

        let pages = self.query_all(PageQuery::default()).await?;
        let cutoff = Utc::now() - ChronoDuration::days(RECENT_DAYS);
        let field = |page: &Page, name: &Option<String>| -> Option<Value> {
            name.as_ref().and_then(|name| page.properties.get(name)).cloned()
        };

        let mut stats = DatabaseStats {
            total_entries: pages.len(),
            ..DatabaseStats::default()
        };
        for page in &pages {
            if let Some(topic) = field(page, &topic_field) {
                for name in tag_names(&topic) {
                    *stats.topics.entry(name).or_default() += 1;
                }
            }

            let status = field(page, &status_field)
                .and_then(|value| tag_names(&value).into_iter().next())
                .unwrap_or_else(|| "Unknown".to_string());
            *stats.statuses.entry(status).or_default() += 1;

            if field(page, &date_field)
                .and_then(|value| date_start(&value))
                .is_some_and(|at| at >= cutoff)
            {
                stats.recent_entries += 1;
            }
        }

        info!(
            total = stats.total_entries,
            recent = stats.recent_entries,
            topics = stats.topics.len(),
            "database stats"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryDatabase;
    use dl_core::{Article, Difficulty, Flashcard, QuestionType, QuizQuestion, Summary};
    use serde_json::json;

    fn materials(title: &str, topic: &str) -> LearningMaterials {
        LearningMaterials {
            summary: Summary {
                article: Article {
                    title: title.to_string(),
                    url: format!("https://example.com/{}", title.len()),
                    content: String::new(),
                    source: "Example".to_string(),
                    published_at: None,
                    topic: topic.to_string(),
                },
                summary: "Short summary.".to_string(),
                key_points: vec!["one".to_string(), "two".to_string()],
                learning_objectives: vec!["goal".to_string()],
            },
            quiz_questions: vec![QuizQuestion {
                question: "Q?".to_string(),
                question_type: QuestionType::ShortAnswer,
                options: vec![],
                correct_answer: "A".to_string(),
                explanation: "E".to_string(),
                difficulty: Difficulty::Medium,
            }],
            flashcards: vec![Flashcard {
                question: "F?".to_string(),
                answer: "B".to_string(),
                category: topic.to_string(),
                difficulty: Difficulty::Easy,
                hint: None,
            }],
        }
    }

    fn adapter(db: Arc<MemoryDatabase>) -> LearningDatabase {
        LearningDatabase::new(db)
            .with_rate_limiter(RateLimiter::unlimited())
            .with_pacing(Pacing::none())
    }

    fn schema(entries: &[(&str, &str)]) -> Schema {
        entries
            .iter()
            .map(|(name, ty)| (name.to_string(), dl_core::storage::PropertyType::from_api(ty)))
            .collect()
    }

    #[test]
    fn test_schema_without_topic_omits_topic() {
        let schema = schema(&[("Name", "title"), ("Notes", "rich_text"), ("Status", "status")]);
        let properties = LearningDatabase::build_properties(&materials("T", "machine learning"), &schema, Utc::now());

        let keys: Vec<_> = properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Name", "Notes", "Status"]);
        assert_eq!(properties["Status"], json!({"status": {"name": "New"}}));
    }

    #[test]
    fn test_full_payload_values() {
        let schema = schema(&[
            ("Title", "title"),
            ("Topic", "multi_select"),
            ("Source URL", "url"),
            ("Date Added", "date"),
            ("Priority", "select"),
            ("Quiz Questions", "rich_text"),
            ("Answers", "rich_text"),
            ("Key Points", "rich_text"),
        ]);
        let long_title = "x".repeat(150);
        let properties =
            LearningDatabase::build_properties(&materials(&long_title, "Data Science"), &schema, Utc::now());

        let title = properties["Title"]["title"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(title.len(), 100);
        assert_eq!(properties["Topic"], json!({"multi_select": [{"name": "Data Science"}]}));
        assert_eq!(properties["Source URL"], json!({"url": "https://example.com/150"}));
        assert_eq!(properties["Priority"], json!({"select": {"name": "Medium"}}));
        assert_eq!(
            properties["Key Points"]["rich_text"][0]["text"]["content"],
            json!("• one\n• two")
        );
        let answers = properties["Answers"]["rich_text"][0]["text"]["content"].as_str().unwrap();
        assert!(answers.starts_with("Quiz Answers:\n**Question 1:** Q?"));
        assert!(answers.contains("\n\nFlashcard Answers:\n**Card 1:**"));
    }

    #[tokio::test]
    async fn test_write_succeeds_against_minimal_schema() {
        let db = Arc::new(MemoryDatabase::with_properties("Learning", &[("Title", "title"), ("Summary", "rich_text")]));
        let learning = adapter(db.clone());

        let created = learning
            .batch_create(&[materials("a", "ai"), materials("bb", "ml")])
            .await;
        assert_eq!(created.len(), 2);

        for page in db.pages().await {
            let keys: Vec<_> = page.properties.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["Summary", "Title"]);
        }
    }

    #[tokio::test]
    async fn test_stats_count_topics_statuses_and_recent() {
        let db = Arc::new(MemoryDatabase::with_properties("Learning", &[]));
        let learning = adapter(db.clone());
        learning.setup_schema().await.unwrap();

        let ids = learning
            .batch_create(&[
                materials("a", "machine learning"),
                materials("bb", "machine learning"),
                materials("ccc", "cooking"),
            ])
            .await;
        learning.update_status(&ids[0], "Reviewed").await.unwrap();
        db.create_page(&json!({"Title": {"title": []}}).as_object().cloned().unwrap())
            .await
            .unwrap();

        let stats = learning.get_stats().await.unwrap();
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.topics["Machine Learning"], 2);
        assert_eq!(stats.topics["General"], 1);
        assert_eq!(stats.statuses["New"], 2);
        assert_eq!(stats.statuses["Reviewed"], 1);
        assert_eq!(stats.statuses["Unknown"], 1);
        assert_eq!(stats.recent_entries, 3);

        let recent = learning.query_recent(7).await;
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn test_stats_page_through_all_results() {
        let db = Arc::new(
            MemoryDatabase::with_properties("Learning", &[("Title", "title")]).with_page_size(2),
        );
        let learning = adapter(db.clone());
        for i in 0..5 {
            learning.create_entry(&materials(&"t".repeat(i + 1), "ai")).await.unwrap();
        }
        assert_eq!(learning.get_stats().await.unwrap().total_entries, 5);
    }

    #[tokio::test]
    async fn test_update_status_requires_status_field() {
        let db = Arc::new(MemoryDatabase::with_properties("Learning", &[("Title", "title")]));
        let learning = adapter(db);
        assert!(learning.update_status("missing", "Reviewed").await.is_err());
    }

    #[tokio::test]
    async fn test_verify_connection_and_empty_results() {
        let db = Arc::new(MemoryDatabase::with_properties("Learning", &[("Title", "title")]));
        let learning = adapter(db.clone());
        assert_eq!(learning.verify_connection().await.unwrap(), "Learning");
        assert_eq!(learning.query_recent(7).await.len(), 0);
        assert_eq!(learning.batch_create(&[]).await.len(), 0);
    }
}
