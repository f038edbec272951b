//! Renders a finished conversation into the caller-facing result.

use super::state::{PipelineState, TerminationReason, TraceStep};
use crate::command::{parse_reply, Arguments, ReplyKind, ToolKind};
use crate::conversation::ConversationState;
use crate::tools::{ToolOutput, ToolResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Confidence reported when the model never supplied one.
pub const UNSPECIFIED_CONFIDENCE: &str = "unspecified";

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalState {
    Finished,
    Error,
}

/// Result of an agent run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub conversation_id: Uuid,
    /// The final answer, or the best partial text on error. Markdown is kept as-is.
    pub final_text: String,
    pub confidence: String,
    pub terminal_state: TerminalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminationReason>,
    /// Number of model calls made.
    pub turns_used: usize,
    /// Every tool call made during the run, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// State reached after each iteration.
    pub trace: Vec<TraceStep>,
}

impl AgentResponse {
    pub fn is_finished(&self) -> bool {
        self.terminal_state == TerminalState::Finished
    }

    pub fn with_trace(mut self, trace: Vec<TraceStep>) -> Self {
        self.trace = trace;
        self
    }

    /// Plain-text rendering for terminals.
    pub fn format_for_display(&self) -> String {
        let mut out = self.final_text.clone();

        if self.confidence != UNSPECIFIED_CONFIDENCE {
            out.push_str(&format!("\n\nConfidence: {}", self.confidence));
        }

        if let Some(reason) = self.reason {
            out.push_str(&format!(
                "\n\n[stopped: {} after {} turn{}]",
                reason,
                self.turns_used,
                if self.turns_used == 1 { "" } else { "s" }
            ));
        }

        if !self.tool_calls.is_empty() {
            out.push_str("\n\nTools used:");
            for call in &self.tool_calls {
                let status = if call.success { "ok" } else { "failed" };
                out.push_str(&format!("\n  - {} [{}]", call, status));
            }
        }

        out
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub tool_kind: ToolKind,
    /// Arguments as the model supplied them.
    pub arguments: Arguments,
    pub success: bool,
    pub output: ToolOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let args = serde_json::to_string(&self.arguments).unwrap_or_default();
        write!(f, "{}({})", self.tool_kind, args)
    }
}

/// Build the response for a conversation that ended in `outcome`.
///
/// Anything other than [`PipelineState::Finished`] is reported as an error
/// with the most useful partial text the model produced.
pub fn render(state: &ConversationState, outcome: &PipelineState) -> AgentResponse {
    let reason = outcome.termination_reason();
    let (terminal_state, final_text) = match outcome {
        PipelineState::Finished => (
            TerminalState::Finished,
            final_answer(state)
                .or_else(|| partial_text(state))
                .unwrap_or_default(),
        ),
        PipelineState::Error(fault) => (
            TerminalState::Error,
            partial_text(state).unwrap_or_else(|| fault.to_string()),
        ),
        PipelineState::NextStep | PipelineState::Unknown => (
            TerminalState::Error,
            partial_text(state).unwrap_or_default(),
        ),
    };

    AgentResponse {
        conversation_id: state.id(),
        final_text,
        confidence: state
            .confidence()
            .unwrap_or(UNSPECIFIED_CONFIDENCE)
            .to_string(),
        terminal_state,
        reason,
        turns_used: state.turns(),
        tool_calls: tool_calls(state),
        trace: Vec::new(),
    }
}

/// Answer carried by the most recent assistant message.
fn final_answer(state: &ConversationState) -> Option<String> {
    let last = state.assistant_messages_rev().next()?;
    match parse_reply(&last.content).ok()?.kind {
        ReplyKind::Answer(answer) => Some(answer),
        _ => None,
    }
}

/// Most recent non-empty prose the model wrote outside of tags.
fn partial_text(state: &ConversationState) -> Option<String> {
    state.assistant_messages_rev().find_map(|message| {
        let parsed = parse_reply(&message.content).ok()?;
        match parsed.kind {
            ReplyKind::Unclassified => None,
            _ if parsed.residual.is_empty() => None,
            _ => Some(parsed.residual),
        }
    })
}

fn tool_calls(state: &ConversationState) -> Vec<ToolCallRecord> {
    state
        .tool_exchanges()
        .filter_map(|(trigger, tool)| {
            let result: ToolResult =
                serde_json::from_value(tool.tool_payload.clone()?).ok()?;
            let arguments = parse_reply(&trigger.content)
                .ok()
                .and_then(|parsed| parsed.command().map(|c| c.arguments.clone()))
                .unwrap_or_default();
            Some(ToolCallRecord {
                tool_kind: result.tool_kind,
                arguments,
                success: result.success,
                output: result.output,
                error: result.error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::Fault;
    use crate::command::Annotations;

    fn state_with(messages: &[(&str, &str)]) -> ConversationState {
        let mut state = ConversationState::new();
        for (role, content) in messages {
            match *role {
                "user" => state.push_user(*content).unwrap(),
                "assistant" => {
                    state.begin_turn().unwrap();
                    state.push_assistant(*content).unwrap()
                }
                _ => unreachable!(),
            }
        }
        state
    }

    #[test]
    fn test_finished_uses_answer_verbatim() {
        let state = state_with(&[
            ("user", "q"),
            ("assistant", "<final_answer>\n# Title\n\n- **bold**\n</final_answer>"),
        ]);
        let response = render(&state, &PipelineState::Finished);

        assert!(response.is_finished());
        assert_eq!(response.final_text, "# Title\n\n- **bold**");
        assert_eq!(response.confidence, UNSPECIFIED_CONFIDENCE);
        assert_eq!(response.turns_used, 1);
        assert!(response.reason.is_none());
    }

    #[test]
    fn test_error_falls_back_to_partial_text() {
        let state = state_with(&[
            ("user", "q"),
            ("assistant", "Paris looks likely. <search>capital of France</search>"),
        ]);
        let outcome = PipelineState::Error(Fault::terminal(
            TerminationReason::DepthExceeded,
            "Max recursion depth exceeded",
        ));
        let response = render(&state, &outcome);

        assert_eq!(response.terminal_state, TerminalState::Error);
        assert_eq!(response.reason, Some(TerminationReason::DepthExceeded));
        assert_eq!(response.final_text, "Paris looks likely.");
    }

    #[test]
    fn test_error_without_prose_describes_failure() {
        let state = state_with(&[("user", "q")]);
        let outcome =
            PipelineState::Error(Fault::terminal(TerminationReason::LlmFailed, "connection refused"));
        let response = render(&state, &outcome);
        assert_eq!(response.final_text, "connection refused");
        assert_eq!(response.turns_used, 0);
    }

    #[test]
    fn test_confidence_and_tool_calls() {
        let mut state = state_with(&[("user", "q"), ("assistant", "<search>rust</search>")]);
        let result = ToolResult::ok(ToolKind::Search, ToolOutput::Text("hits".to_string()));
        state
            .push_tool(Some(ToolKind::Search), "<search.result>hits</search.result>", Some(result.to_payload()))
            .unwrap();
        state.record_annotations(&Annotations {
            confidence: Some("high".to_string()),
            ..Default::default()
        });
        state.begin_turn().unwrap();
        state
            .push_assistant(r#"<final_answer confidence="high">Rust.</final_answer>"#)
            .unwrap();

        let response = render(&state, &PipelineState::Finished);
        assert_eq!(response.confidence, "high");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments["query"], "rust");
        assert!(response.tool_calls[0].success);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["terminal_state"], "finished");
        assert!(json.get("reason").is_none());

        let display = response.format_for_display();
        assert!(display.starts_with("Rust."));
        assert!(display.contains("Confidence: high"));
        assert!(display.contains("search({\"query\":\"rust\"}) [ok]"));
    }
}
