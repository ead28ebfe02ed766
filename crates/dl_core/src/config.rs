use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime};

use crate::{Error, Result};

pub const DEFAULT_TOPICS: [&str; 4] = [
    "artificial intelligence",
    "machine learning",
    "software development",
    "data science",
];

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_PERPLEXITY_MODEL: &str = "llama-3.1-sonar-large-128k-online";
pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";

#[derive(Clone, PartialEq)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub perplexity_api_key: Option<String>,
    pub perplexity_model: String,
    pub perplexity_base_url: String,
    pub notion_token: String,
    pub notion_database_id: String,
    pub notion_base_url: String,
    pub default_topics: Vec<String>,
    pub max_articles_per_topic: usize,
    pub content_max_age_hours: u32,
    pub summary_sentence_count: u32,
    pub quiz_questions_per_article: u32,
    pub flashcards_per_article: u32,
    pub api_rate_limit_per_minute: u32,
    pub llm_min_interval: Duration,
    pub notion_min_interval: Duration,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("perplexity_api_key", &self.perplexity_api_key.as_deref().map(|_| "<redacted>"))
            .field("perplexity_model", &self.perplexity_model)
            .field("perplexity_base_url", &self.perplexity_base_url)
            .field("notion_token", &redact(&self.notion_token))
            .field("notion_database_id", &self.notion_database_id)
            .field("notion_base_url", &self.notion_base_url)
            .field("default_topics", &self.default_topics)
            .field("max_articles_per_topic", &self.max_articles_per_topic)
            .field("content_max_age_hours", &self.content_max_age_hours)
            .field("summary_sentence_count", &self.summary_sentence_count)
            .field("quiz_questions_per_article", &self.quiz_questions_per_article)
            .field("flashcards_per_article", &self.flashcards_per_article)
            .field("api_rate_limit_per_minute", &self.api_rate_limit_per_minute)
            .field("llm_min_interval", &self.llm_min_interval)
            .field("notion_min_interval", &self.notion_min_interval)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            perplexity_api_key: None,
            perplexity_model: DEFAULT_PERPLEXITY_MODEL.to_string(),
            perplexity_base_url: DEFAULT_PERPLEXITY_BASE_URL.to_string(),
            notion_token: String::new(),
            notion_database_id: String::new(),
            notion_base_url: DEFAULT_NOTION_BASE_URL.to_string(),
            default_topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            max_articles_per_topic: 5,
            content_max_age_hours: 48,
            summary_sentence_count: 4,
            quiz_questions_per_article: 2,
            flashcards_per_article: 3,
            api_rate_limit_per_minute: 60,
            llm_min_interval: Duration::from_millis(1000),
            notion_min_interval: Duration::from_millis(300),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a key lookup. Unparsable values are
    /// collected and reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut env = EnvReader::new(lookup);

        let config = Self {
            openai_api_key: env.string("OPENAI_API_KEY", ""),
            openai_model: env.string("OPENAI_MODEL", &defaults.openai_model),
            openai_base_url: env.string("OPENAI_BASE_URL", &defaults.openai_base_url),
            perplexity_api_key: env.optional("PERPLEXITY_API_KEY"),
            perplexity_model: env.string("PERPLEXITY_MODEL", &defaults.perplexity_model),
            perplexity_base_url: env.string("PERPLEXITY_BASE_URL", &defaults.perplexity_base_url),
            notion_token: env.string("NOTION_TOKEN", ""),
            notion_database_id: env.string("NOTION_DATABASE_ID", ""),
            notion_base_url: env.string("NOTION_BASE_URL", &defaults.notion_base_url),
            default_topics: env.list("DEFAULT_TOPICS").unwrap_or(defaults.default_topics),
            max_articles_per_topic: env.number("MAX_ARTICLES_PER_TOPIC", defaults.max_articles_per_topic),
            content_max_age_hours: env.number("CONTENT_MAX_AGE_HOURS", defaults.content_max_age_hours),
            summary_sentence_count: env.number("SUMMARY_SENTENCE_COUNT", defaults.summary_sentence_count),
            quiz_questions_per_article: env.number("QUIZ_QUESTIONS_PER_ARTICLE", defaults.quiz_questions_per_article),
            flashcards_per_article: env.number("FLASHCARDS_PER_ARTICLE", defaults.flashcards_per_article),
            api_rate_limit_per_minute: env.number("API_RATE_LIMIT_PER_MINUTE", defaults.api_rate_limit_per_minute),
            llm_min_interval: Duration::from_millis(env.number("LLM_MIN_INTERVAL_MS", 1000u64)),
            notion_min_interval: Duration::from_millis(env.number("NOTION_MIN_INTERVAL_MS", 300u64)),
            log_level: env.string("LOG_LEVEL", &defaults.log_level).to_lowercase(),
            log_file: env.optional("LOG_FILE").map(PathBuf::from),
        };

        env.finish()?;
        Ok(config)
    }

    /// Itemized list of problems that must stop the process before any run.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.openai_api_key.is_empty() {
            errors.push("OPENAI_API_KEY is required".to_string());
        }
        if self.notion_token.is_empty() {
            errors.push("NOTION_TOKEN is required".to_string());
        }
        if self.notion_database_id.is_empty() {
            errors.push("NOTION_DATABASE_ID is required".to_string());
        }
        if self.max_articles_per_topic == 0 {
            errors.push("MAX_ARTICLES_PER_TOPIC must be positive".to_string());
        }
        if self.content_max_age_hours == 0 {
            errors.push("CONTENT_MAX_AGE_HOURS must be positive".to_string());
        }
        if self.summary_sentence_count == 0 {
            errors.push("SUMMARY_SENTENCE_COUNT must be positive".to_string());
        }
        if self.api_rate_limit_per_minute == 0 {
            errors.push("API_RATE_LIMIT_PER_MINUTE must be positive".to_string());
        }
        if self.default_topics.is_empty() {
            errors.push("DEFAULT_TOPICS must name at least one topic".to_string());
        }
        for (key, value) in [
            ("OPENAI_BASE_URL", &self.openai_base_url),
            ("PERPLEXITY_BASE_URL", &self.perplexity_base_url),
            ("NOTION_BASE_URL", &self.notion_base_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                errors.push(format!("{} is not a valid URL ({}): {}", key, e, value));
            }
        }

        errors
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub run_time: NaiveTime,
    pub timezone_name: String,
    pub timezone: FixedOffset,
    pub topics: Option<Vec<String>>,
    pub weekdays_only: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            run_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            timezone_name: "UTC".to_string(),
            timezone: utc_offset(),
            topics: None,
            weekdays_only: true,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(30 * 60),
        }
    }
}

impl ScheduleConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut env = EnvReader::new(lookup);

        let enabled = env.flag("SCHEDULER_ENABLED", defaults.enabled);
        let weekdays_only = env.flag("SCHEDULER_WEEKDAYS_ONLY", defaults.weekdays_only);
        let retry_attempts = env.number("SCHEDULER_RETRY_ATTEMPTS", defaults.retry_attempts);
        let retry_delay_minutes = env.number("SCHEDULER_RETRY_DELAY_MINUTES", 30u64);
        let topics = env.list("SCHEDULER_TOPICS");

        let run_time_raw = env.string("SCHEDULER_RUN_TIME", "08:00");
        let run_time = match parse_run_time(&run_time_raw) {
            Some(time) => time,
            None => {
                env.error(format!("SCHEDULER_RUN_TIME must be HH:MM, got '{}'", run_time_raw));
                defaults.run_time
            }
        };

        let timezone_name = env.string("SCHEDULER_TIMEZONE", "UTC");
        let timezone = match parse_timezone(&timezone_name) {
            Some(offset) => offset,
            None => {
                env.error(format!(
                    "SCHEDULER_TIMEZONE must be UTC or a fixed offset like +02:00, got '{}'",
                    timezone_name
                ));
                defaults.timezone
            }
        };

        if retry_attempts == 0 {
            env.error("SCHEDULER_RETRY_ATTEMPTS must be positive".to_string());
        }

        env.finish()?;
        Ok(Self {
            enabled,
            run_time,
            timezone_name,
            timezone,
            topics,
            weekdays_only,
            retry_attempts,
            retry_delay: Duration::from_secs(retry_delay_minutes * 60),
        })
    }
}

/// Parse `HH:MM` in 24-hour format.
pub fn parse_run_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Parse `UTC`, `GMT`, `Z`, or a fixed offset such as `+02:00`, `-0530`,
/// `UTC+1`.
pub fn parse_timezone(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    let rest = ["UTC", "utc", "GMT", "gmt", "Z"]
        .iter()
        .find_map(|prefix| value.strip_prefix(prefix))
        .unwrap_or(value);
    if rest.is_empty() {
        return Some(utc_offset());
    }

    let (sign, digits) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => (digits.get(..2)?, digits.get(2..)?),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!("zero offset is always valid"))
}

struct EnvReader<F> {
    lookup: F,
    errors: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            errors: Vec::new(),
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .optional(key)?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        (!items.is_empty()).then_some(items)
    }

    fn number<T: FromStr>(&mut self, key: &str, default: T) -> T {
        match self.optional(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                self.errors
                    .push(format!("{} must be a non-negative integer, got '{}'", key, raw));
                default
            }),
        }
    }

    fn flag(&mut self, key: &str, default: bool) -> bool {
        match self.optional(key).map(|v| v.to_lowercase()) {
            None => default,
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
            Some(v) => {
                self.errors.push(format!("{} must be true or false, got '{}'", key, v));
                default
            }
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(self.errors))
        }
    }
}
