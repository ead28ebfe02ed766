use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dl_core::{Config, RateLimiter};
use dl_fetcher::{filter_recent, ContentFetcher};
use dl_inference::{create_model, MaterialGenerator, Summarizer};
use dl_storage::LearningDatabase;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no articles were fetched")]
    NoArticles,

    #[error("no summaries were generated")]
    NoSummaries,

    #[error(transparent)]
    Core(#[from] dl_core::Error),
}

/// Per-run knobs taken from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub default_topics: Vec<String>,
    pub max_articles_per_topic: usize,
    pub content_max_age_hours: u32,
    pub summary_sentence_count: u32,
    pub quiz_questions_per_article: u32,
    pub flashcards_per_article: u32,
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_topics: config.default_topics.clone(),
            max_articles_per_topic: config.max_articles_per_topic,
            content_max_age_hours: config.content_max_age_hours,
            summary_sentence_count: config.summary_sentence_count,
            quiz_questions_per_article: config.quiz_questions_per_article,
            flashcards_per_article: config.flashcards_per_article,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Counts for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub topics: Vec<String>,
    pub articles_fetched: usize,
    pub recent_articles: usize,
    pub summaries: usize,
    pub materials: usize,
    pub created: Vec<String>,
    pub dry_run: bool,
    pub elapsed: Duration,
}

impl RunReport {
    /// Materials were produced but none of them reached the database.
    /// The run still completes; callers only warn about it.
    pub fn wrote_nothing(&self) -> bool {
        !self.dry_run && self.materials > 0 && self.created.is_empty()
    }

    fn log(&self) {
        info!(
            elapsed_ms = self.elapsed.as_millis() as u64,
            topics = self.topics.len(),
            articles_fetched = self.articles_fetched,
            recent_articles = self.recent_articles,
            summaries = self.summaries,
            materials = self.materials,
            entries_created = self.created.len(),
            dry_run = self.dry_run,
            "learning feed generation complete"
        );
    }
}

/// Something the scheduler can run on a trigger.
#[async_trait]
pub trait PipelineRunner: Send + Sync + fmt::Debug {
    async fn run(&self, topics: Option<&[String]>) -> Result<RunReport, PipelineError>;
}

/// Fetch, summarize, generate and persist, in that order.
#[derive(Debug)]
pub struct LearningPipeline {
    fetcher: ContentFetcher,
    summarizer: Summarizer,
    generator: MaterialGenerator,
    database: Option<LearningDatabase>,
    settings: RunSettings,
}

impl LearningPipeline {
    /// `database` is `None` for dry runs; nothing is written.
    pub fn new(
        fetcher: ContentFetcher,
        summarizer: Summarizer,
        generator: MaterialGenerator,
        database: Option<LearningDatabase>,
        settings: RunSettings,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            generator,
            database,
            settings,
        }
    }

    pub fn from_config(config: &Config, dry_run: bool) -> dl_core::Result<Self> {
        let model = create_model(config)?;
        let summarizer =
            Summarizer::new(model.clone()).with_rate_limiter(RateLimiter::new(config.llm_min_interval));
        let generator = MaterialGenerator::new(model).with_rate_limiter(RateLimiter::new(config.llm_min_interval));
        let database = if dry_run {
            None
        } else {
            Some(LearningDatabase::from_config(config)?)
        };

        Ok(Self::new(
            ContentFetcher::from_config(config)?,
            summarizer,
            generator,
            database,
            RunSettings::from(config),
        ))
    }

    pub fn database(&self) -> Option<&LearningDatabase> {
        self.database.as_ref()
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Check the database is reachable. Dry runs have nothing to check.
    pub async fn verify(&self) -> Result<(), PipelineError> {
        match &self.database {
            Some(database) => {
                database.verify_connection().await?;
            }
            None => info!("dry run, skipping database connection check"),
        }
        Ok(())
    }

    /// One full pass over `topics`, or the configured defaults when `None`
    /// or empty. Finding nothing recent is not an error.
    pub async fn run(&self, topics: Option<&[String]>) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let topics = match topics {
            Some(topics) if !topics.is_empty() => topics.to_vec(),
            _ => self.settings.default_topics.clone(),
        };
        info!(topics = %topics.join(", "), "starting learning feed generation");

        info!("step 1: fetching content");
        let articles = self
            .fetcher
            .fetch_content(&topics, self.settings.max_articles_per_topic)
            .await;
        if articles.is_empty() {
            error!("no articles were fetched, stopping");
            return Err(PipelineError::NoArticles);
        }

        let mut report = RunReport {
            topics,
            articles_fetched: articles.len(),
            dry_run: self.database.is_none(),
            ..RunReport::default()
        };

        let recent = filter_recent(articles, self.settings.content_max_age_hours);
        report.recent_articles = recent.len();
        if recent.is_empty() {
            warn!(max_age_hours = self.settings.content_max_age_hours, "no recent articles after filtering");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        info!("step 2: generating summaries");
        let summaries = self
            .summarizer
            .summarize_batch(&recent, self.settings.summary_sentence_count)
            .await;
        if summaries.is_empty() {
            error!("no summaries were generated, stopping");
            return Err(PipelineError::NoSummaries);
        }
        report.summaries = summaries.len();

        info!("step 3: generating quiz questions and flashcards");
        let materials = self
            .generator
            .generate_batch(
                &summaries,
                self.settings.quiz_questions_per_article,
                self.settings.flashcards_per_article,
            )
            .await;
        report.materials = materials.len();

        match &self.database {
            Some(database) => {
                info!("step 4: saving to database");
                report.created = database.batch_create(&materials).await;
            }
            None => info!(materials = materials.len(), "dry run, skipping database writes"),
        }

        report.elapsed = started.elapsed();
        report.log();
        Ok(report)
    }
}

#[async_trait]
impl PipelineRunner for LearningPipeline {
    async fn run(&self, topics: Option<&[String]>) -> Result<RunReport, PipelineError> {
        LearningPipeline::run(self, topics).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};
    use dl_core::Pacing;
    use dl_fetcher::{ArticleSource, PerplexitySource, RssSource};
    use dl_inference::ScriptedModel;
    use dl_core::storage::{DatabaseApi, DatabaseInfo, PageQuery, QueryPage};
    use dl_core::Error;
    use serde_json::{Map, Value};

    #[derive(Debug)]
    struct UnreachableDatabase;

    #[async_trait]
    impl DatabaseApi for UnreachableDatabase {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn retrieve_database(&self) -> dl_core::Result<DatabaseInfo> {
            Err(Error::Database("connection refused".to_string()))
        }

        async fn update_properties(&self, _: &Map<String, Value>) -> dl_core::Result<()> {
            Err(Error::Database("connection refused".to_string()))
        }

        async fn create_page(&self, _: &Map<String, Value>) -> dl_core::Result<String> {
            Err(Error::Database("connection refused".to_string()))
        }

        async fn query(&self, _: &PageQuery) -> dl_core::Result<QueryPage> {
            Err(Error::Database("connection refused".to_string()))
        }

        async fn update_page(&self, _: &str, _: &Map<String, Value>) -> dl_core::Result<()> {
            Err(Error::Database("connection refused".to_string()))
        }
    }

    fn block(title: &str, hours_old: i64) -> String {
        format!(
            "Title: {title}\nURL: https://example.com/{title}\nSummary: About {title}.\nSource: Example\nDate: {}\n\n",
            (Utc::now() - ChronoDuration::hours(hours_old)).to_rfc3339()
        )
    }

    fn fetcher(search: ScriptedModel) -> ContentFetcher {
        let primary = PerplexitySource::new(Arc::new(search), 0);
        ContentFetcher::new(
            Some(Box::new(primary) as Box<dyn ArticleSource>),
            Box::new(RssSource::with_feeds(HashMap::new()).unwrap()),
        )
        .with_pacing(Pacing::none())
    }

    fn pipeline(
        search: ScriptedModel,
        llm: ScriptedModel,
        database: Option<LearningDatabase>,
    ) -> LearningPipeline {
        let llm: Arc<ScriptedModel> = Arc::new(llm);
        let settings = RunSettings {
            default_topics: vec!["rust".to_string()],
            ..RunSettings::default()
        };
        LearningPipeline::new(
            fetcher(search),
            Summarizer::new(llm.clone())
                .with_rate_limiter(RateLimiter::unlimited())
                .with_pacing(Pacing::none()),
            MaterialGenerator::new(llm)
                .with_rate_limiter(RateLimiter::unlimited())
                .with_pacing(Pacing::none()),
            database,
            settings,
        )
    }

    #[tokio::test]
    async fn test_no_articles_is_an_error() {
        let pipeline = pipeline(ScriptedModel::new("search").reply("nothing here"), ScriptedModel::new("llm"), None);
        assert!(matches!(pipeline.run(None).await, Err(PipelineError::NoArticles)));
    }

    #[tokio::test]
    async fn test_nothing_recent_is_success() {
        let pipeline = pipeline(
            ScriptedModel::new("search").reply(block("old", 100)),
            ScriptedModel::new("llm"),
            None,
        );
        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.articles_fetched, 1);
        assert_eq!(report.recent_articles, 0);
        assert_eq!(report.summaries, 0);
        assert!(!report.wrote_nothing());
    }

    #[tokio::test]
    async fn test_every_summary_failing_is_an_error() {
        let pipeline = pipeline(
            ScriptedModel::new("search").reply(block("fresh", 1)),
            ScriptedModel::new("llm").fail("upstream down"),
            None,
        );
        assert!(matches!(pipeline.run(None).await, Err(PipelineError::NoSummaries)));
    }

    #[tokio::test]
    async fn test_dry_run_skips_writes() {
        let llm = ScriptedModel::new("llm")
            .reply(r#"{"summary": "S", "key_points": [], "learning_objectives": []}"#)
            .reply(r#"{"questions": []}"#)
            .reply(r#"{"flashcards": []}"#);
        let pipeline = pipeline(ScriptedModel::new("search").reply(block("fresh", 1)), llm, None);

        let topics = vec!["custom".to_string()];
        let report = pipeline.run(Some(&topics)).await.unwrap();
        assert_eq!(report.topics, topics);
        assert_eq!(report.materials, 1);
        assert!(report.created.is_empty());
        assert!(report.dry_run);
        assert!(!report.wrote_nothing());
        assert!(pipeline.verify().await.is_ok());
    }

    #[tokio::test]
    async fn test_all_writes_failing_still_completes_the_run() {
        let llm = ScriptedModel::new("llm")
            .reply(r#"{"summary": "S", "key_points": [], "learning_objectives": []}"#)
            .reply(r#"{"questions": []}"#)
            .reply(r#"{"flashcards": []}"#);
        let database = LearningDatabase::new(Arc::new(UnreachableDatabase))
            .with_rate_limiter(RateLimiter::unlimited())
            .with_pacing(Pacing::none());
        let pipeline = pipeline(ScriptedModel::new("search").reply(block("fresh", 1)), llm, Some(database));

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.materials, 1);
        assert!(report.created.is_empty());
        assert!(report.wrote_nothing());
        assert!(matches!(pipeline.verify().await, Err(PipelineError::Core(_))));
    }
}
