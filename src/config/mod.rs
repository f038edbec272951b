//! Configuration module for Ponder.
//!
//! Handles loading settings from disk and the environment, and the prompt
//! templates the agent speaks to the model with.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts};
pub use settings::{
    AgentSettings, CodeSettings, GeneralSettings, LlmSettings, PromptSettings, ScrapeSettings,
    SearchProviderKind, SearchSettings, Settings,
};
