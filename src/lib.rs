//! Ponder - a reasoning loop for chat models
//!
//! Ponder lets a chat-completion model work through a question in turns. Each
//! reply may carry one tool tag (web search, Python execution or page
//! scraping); the tool runs and its output is fed back until the model
//! produces a final answer or the turn budget runs out.
//!
//! # Architecture
//!
//! - `command` - Tag grammar and parser for model replies
//! - `conversation` - Message history and turn bookkeeping
//! - `agent` - Orchestration loop and response formatter
//! - `tools` - Uniform adapters over the tool collaborators
//! - `llm` - Chat-completion collaborator
//! - `search` - Search providers (Tavily, DuckDuckGo)
//! - `sandbox` - Code runners
//! - `scrape` - Page fetching and text extraction
//! - `config` - Settings and prompt templates
//! - `mock` - Scripted collaborators for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use ponder::cli::{build_agent, AgentOverrides};
//! use ponder::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let agent = build_agent(&settings, &AgentOverrides::default())?;
//!
//!     let response = agent.run("What is the population of Oslo divided by 7?").await;
//!     println!("{}", response.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod command;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod mock;
pub mod openai;
pub mod sandbox;
pub mod scrape;
pub mod search;
pub mod text;
pub mod tools;

pub use error::{PonderError, Result};
