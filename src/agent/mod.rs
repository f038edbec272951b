//! Orchestration loop.
//!
//! The agent sends the conversation to the model, parses the reply for a tool
//! tag, runs the tool, and feeds the result back until the model answers or
//! the turn budget runs out.

mod response;
mod runner;
mod state;

pub use response::{render, AgentResponse, TerminalState, ToolCallRecord, UNSPECIFIED_CONFIDENCE};
pub use runner::Agent;
pub use state::{Fault, PipelineState, TerminationReason, TraceStep};

use crate::llm::CompletionParams;
use serde::{Deserialize, Serialize};

/// Explicit per-agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model calls per request.
    pub max_depth: usize,
    /// Tool feedback longer than this is truncated before the model sees it.
    pub max_tool_message_chars: usize,
    pub completion: CompletionParams,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_tool_message_chars: 16_000,
            completion: CompletionParams::default(),
        }
    }
}
