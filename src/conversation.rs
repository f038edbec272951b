//! Conversation state owned by a single agent run.

use crate::command::{Annotations, ToolKind};
use crate::error::{PonderError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<ToolKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_payload: Option<serde_json::Value>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// A tool message. `tool_name` is `None` for loop feedback that no tool produced.
    pub fn tool(
        tool_name: Option<ToolKind>,
        content: impl Into<String>,
        tool_payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name,
            tool_payload,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
            tool_payload: None,
        }
    }
}

/// Ordered history plus the turn bookkeeping of one request.
///
/// Messages are append-only. Only the orchestration loop mutates the state.
#[derive(Debug, Clone)]
pub struct ConversationState {
    id: Uuid,
    messages: Vec<Message>,
    /// Number of leading messages carried over from earlier requests.
    carried: usize,
    turns: usize,
    terminal: bool,
    confidence: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::with_history(Vec::new())
    }

    /// Start from history carried over from a previous request.
    pub fn with_history(messages: Vec<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            carried: messages.len(),
            messages,
            turns: 0,
            terminal: false,
            confidence: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended during this request.
    pub fn request_messages(&self) -> &[Message] {
        &self.messages[self.carried..]
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Last confidence annotation the model supplied, if any.
    pub fn confidence(&self) -> Option<&str> {
        self.confidence.as_deref()
    }

    /// Start a new turn and return its number (1-based).
    pub fn begin_turn(&mut self) -> Result<usize> {
        self.ensure_open()?;
        self.turns += 1;
        Ok(self.turns)
    }

    /// Freeze the conversation. Further appends are rejected.
    pub fn mark_terminal(&mut self) {
        self.terminal = true;
    }

    pub fn record_annotations(&mut self, annotations: &Annotations) {
        if let Some(confidence) = &annotations.confidence {
            self.confidence = Some(confidence.clone());
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<()> {
        self.append(Message::user(content))
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<()> {
        self.append(Message::assistant(content))
    }

    /// Append a tool message. It must directly follow the assistant message
    /// that triggered it.
    pub fn push_tool(
        &mut self,
        tool_name: Option<ToolKind>,
        content: impl Into<String>,
        tool_payload: Option<serde_json::Value>,
    ) -> Result<()> {
        match self.messages.last() {
            Some(last) if last.role == Role::Assistant => {}
            _ => {
                return Err(PonderError::History(
                    "tool message must follow the assistant message that triggered it"
                        .to_string(),
                ))
            }
        }
        self.append(Message::tool(tool_name, content, tool_payload))
    }

    /// Tool outputs of this request, each paired with the assistant message
    /// that triggered it.
    pub fn tool_exchanges(&self) -> impl Iterator<Item = (&Message, &Message)> {
        self.request_messages()
            .windows(2)
            .filter(|pair| pair[1].role == Role::Tool && pair[1].tool_name.is_some())
            .map(|pair| (&pair[0], &pair[1]))
    }

    /// Assistant messages of this request, most recent first.
    pub fn assistant_messages_rev(&self) -> impl Iterator<Item = &Message> {
        self.request_messages()
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
    }

    fn append(&mut self, message: Message) -> Result<()> {
        self.ensure_open()?;
        self.messages.push(message);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.terminal {
            return Err(PonderError::History(
                "conversation has already terminated".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_increase_by_one() {
        let mut state = ConversationState::new();
        assert_eq!(state.turns(), 0);
        assert_eq!(state.begin_turn().unwrap(), 1);
        assert_eq!(state.begin_turn().unwrap(), 2);
        assert_eq!(state.turns(), 2);
    }

    #[test]
    fn test_tool_message_requires_preceding_assistant() {
        let mut state = ConversationState::new();
        state.push_user("hi").unwrap();
        let err = state
            .push_tool(Some(ToolKind::Search), "<search.result>[]</search.result>", None)
            .unwrap_err();
        assert!(matches!(err, PonderError::History(_)));

        state.push_assistant("<search>hi</search>").unwrap();
        state
            .push_tool(Some(ToolKind::Search), "<search.result>[]</search.result>", None)
            .unwrap();

        // A second tool message would be orphaned.
        assert!(state.push_tool(None, "again", None).is_err());
        assert_eq!(state.messages().len(), 3);
    }

    #[test]
    fn test_terminal_state_rejects_appends() {
        let mut state = ConversationState::new();
        state.push_user("question").unwrap();
        state.mark_terminal();
        assert!(state.is_terminal());
        assert!(state.push_assistant("late").is_err());
        assert!(state.begin_turn().is_err());
    }

    #[test]
    fn test_confidence_keeps_last_annotation() {
        let mut state = ConversationState::new();
        state.record_annotations(&Annotations {
            confidence: Some("low".to_string()),
            ..Default::default()
        });
        state.record_annotations(&Annotations::default());
        assert_eq!(state.confidence(), Some("low"));
        state.record_annotations(&Annotations {
            confidence: Some("high".to_string()),
            ..Default::default()
        });
        assert_eq!(state.confidence(), Some("high"));
    }

    #[test]
    fn test_carried_history_is_not_part_of_the_request() {
        let history = vec![
            Message::user("earlier question"),
            Message::assistant("earlier answer"),
        ];
        let mut state = ConversationState::with_history(history);
        state.push_user("follow-up").unwrap();
        state.push_assistant("<search>x</search>").unwrap();
        state
            .push_tool(Some(ToolKind::Search), "<search.result>[]</search.result>", None)
            .unwrap();

        assert_eq!(state.messages().len(), 5);
        assert_eq!(state.request_messages().len(), 3);
        assert_eq!(state.assistant_messages_rev().count(), 1);

        let exchanges: Vec<_> = state.tool_exchanges().collect();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].0.content, "<search>x</search>");
    }

    #[test]
    fn test_message_serialization_omits_empty_tool_fields() {
        let json = serde_json::to_string(&Message::user("hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }
}
