pub mod config;
pub mod error;
pub mod models;
pub mod pacing;
pub mod rate_limit;
pub mod storage;
pub mod types;

pub use config::{Config, ScheduleConfig};
pub use error::{Error, Result};
pub use models::{ChatModel, ChatRequest};
pub use pacing::Pacing;
pub use rate_limit::RateLimiter;
pub use storage::DatabaseApi;
pub use types::{
    Article, Difficulty, Flashcard, LearningMaterials, QuestionType, QuizQuestion, Summary,
};
