use std::sync::Arc;
use std::time::Duration;

use dl_core::{ChatModel, Config, Result};

pub mod openai;
pub mod scripted;

pub use openai::OpenAiChatModel;
pub use scripted::ScriptedModel;

pub const LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the chat model used for summaries and learning materials.
pub fn create_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    let model = OpenAiChatModel::new(
        "openai",
        &config.openai_api_key,
        &config.openai_model,
        &config.openai_base_url,
        LLM_TIMEOUT,
    )?;
    Ok(Arc::new(model))
}
