//! Chat model backed by an OpenAI-compatible completions endpoint.

use super::{CompletionParams, LanguageModel};
use crate::conversation::{Message, Role};
use crate::error::{PonderError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Language model talking to DeepSeek, OpenAI, or any compatible server.
pub struct OpenAiChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
}

impl OpenAiChatModel {
    pub fn new(api_base: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client(api_base, api_key, timeout)?,
        })
    }
}

/// Map history onto chat roles.
///
/// The tag protocol is textual, so tool output travels as a user message
/// rather than as an OpenAI tool-call result.
fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let content = message.content.clone();
    let built: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| PonderError::Llm(e.to_string()))?
            .into(),
        Role::User | Role::Tool => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| PonderError::Llm(e.to_string()))?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| PonderError::Llm(e.to_string()))?
            .into(),
    };
    Ok(built)
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    #[instrument(skip(self, messages), fields(model = %params.model, messages = messages.len()))]
    async fn complete(&self, messages: &[Message], params: &CompletionParams) -> Result<String> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&params.model).messages(request_messages);
        if let Some(temperature) = params.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = params.max_tokens {
            #[allow(deprecated)]
            builder.max_tokens(max_tokens);
        }
        let request = builder
            .build()
            .map_err(|e| PonderError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PonderError::Llm(format!("Completion API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PonderError::Llm("No response from model".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        debug!("Model replied with {} characters", content.len());
        Ok(content)
    }
}
