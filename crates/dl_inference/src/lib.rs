pub mod generator;
pub mod models;
pub mod parse;
pub mod summarizer;

pub use generator::MaterialGenerator;
pub use models::{create_model, OpenAiChatModel, ScriptedModel};
pub use summarizer::Summarizer;

pub mod prelude {
    pub use super::generator::MaterialGenerator;
    pub use super::models::{create_model, OpenAiChatModel, ScriptedModel};
    pub use super::summarizer::Summarizer;
    pub use dl_core::{ChatModel, ChatRequest, Error, Result};
}
