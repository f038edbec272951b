//! Control signals of the orchestration loop.

use crate::command::{ParseError, ToolKind};
use serde::{Deserialize, Serialize};

/// Why a run stopped without a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    DepthExceeded,
    ClassificationFailed,
    LlmFailed,
    Cancelled,
    /// The conversation refused an append. Indicates a loop bug.
    HistoryRejected,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::DepthExceeded => "depth-exceeded",
            TerminationReason::ClassificationFailed => "classification-failed",
            TerminationReason::LlmFailed => "llm-failed",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::HistoryRejected => "history-rejected",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Something went wrong during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The model wrote a malformed tag. Fed back, the loop continues.
    Parse(ParseError),
    /// A tool reported failure. Fed back, the loop continues.
    ToolFailed { tool_kind: ToolKind, error: String },
    /// The loop cannot continue.
    Terminal {
        reason: TerminationReason,
        message: String,
    },
}

impl Fault {
    pub fn terminal(reason: TerminationReason, message: impl Into<String>) -> Self {
        Fault::Terminal {
            reason,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Fault::Terminal { .. })
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self {
            Fault::Terminal { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Parse(e) => write!(f, "{}", e),
            Fault::ToolFailed { tool_kind, error } => write!(f, "{} failed: {}", tool_kind, error),
            Fault::Terminal { message, .. } => write!(f, "{}", message),
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    /// A tool ran; call the model again.
    NextStep,
    Error(Fault),
    /// The model produced a final answer.
    Finished,
    /// The reply was neither a command nor an answer.
    Unknown,
}

impl PipelineState {
    /// Whether the loop stops here.
    pub fn is_terminal(&self) -> bool {
        match self {
            PipelineState::Finished => true,
            PipelineState::Error(fault) => fault.is_terminal(),
            PipelineState::NextStep | PipelineState::Unknown => false,
        }
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self {
            PipelineState::Error(fault) => fault.termination_reason(),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::NextStep => "next_step",
            PipelineState::Error(_) => "error",
            PipelineState::Finished => "finished",
            PipelineState::Unknown => "unknown",
        }
    }
}

/// One entry in the run's state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Turn the state was reached in. 0 is before the first model call.
    pub turn: usize,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceStep {
    pub fn new(turn: usize, state: &PipelineState) -> Self {
        let detail = match state {
            PipelineState::Error(fault) => Some(fault.to_string()),
            _ => None,
        };
        Self {
            turn,
            state: state.label().to_string(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&TerminationReason::DepthExceeded).unwrap();
        assert_eq!(json, "\"depth-exceeded\"");
        assert_eq!(TerminationReason::ClassificationFailed.to_string(), "classification-failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Finished.is_terminal());
        assert!(!PipelineState::NextStep.is_terminal());
        assert!(!PipelineState::Unknown.is_terminal());
        assert!(!PipelineState::Error(Fault::Parse(ParseError::EmptyFinalAnswer)).is_terminal());

        let depth = PipelineState::Error(Fault::terminal(TerminationReason::DepthExceeded, "out"));
        assert!(depth.is_terminal());
        assert_eq!(depth.termination_reason(), Some(TerminationReason::DepthExceeded));
    }

    #[test]
    fn test_trace_step_carries_fault_detail() {
        let step = TraceStep::new(
            3,
            &PipelineState::Error(Fault::ToolFailed {
                tool_kind: ToolKind::ExecuteCode,
                error: "NameError".to_string(),
            }),
        );
        assert_eq!(step.state, "error");
        assert_eq!(step.detail.as_deref(), Some("execute_code failed: NameError"));
    }
}
