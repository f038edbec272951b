//! Chat-completion collaborator.

mod openai;

pub use openai::OpenAiChatModel;

use crate::conversation::Message;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-request completion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "deepseek-reasoner".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A black-box chat model: full history in, assistant text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[Message], params: &CompletionParams) -> Result<String>;
}
