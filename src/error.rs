//! Error types for Ponder.

use crate::command::ParseError;
use thiserror::Error;

/// Library-level error type for Ponder operations.
#[derive(Error, Debug)]
pub enum PonderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed tool tag: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Maximum recursion depth ({0}) exceeded")]
    DepthExceeded(usize),

    #[error("Could not classify model output: {0}")]
    Classification(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Conversation cancelled")]
    Cancelled,

    #[error("Conversation history error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),
}

/// Result type alias for Ponder operations.
pub type Result<T> = std::result::Result<T, PonderError>;
