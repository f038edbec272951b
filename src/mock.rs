//! Scripted collaborators for driving the agent without network access.

use crate::command::{Arguments, ToolKind};
use crate::conversation::Message;
use crate::error::{PonderError, Result};
use crate::llm::{CompletionParams, LanguageModel};
use crate::tools::{ToolAdapter, ToolResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A model that replays a fixed list of replies and records what it was sent.
///
/// Once the script runs out every call fails with [`PonderError::Llm`].
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Script that can include failures.
    pub fn with_results(results: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            replies: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The history passed to each call, in order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[Message], _params: &CompletionParams) -> Result<String> {
        lock(&self.calls).push(messages.to_vec());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(PonderError::Llm("script exhausted".to_string())))
    }
}

/// A tool that returns scripted results and records its arguments.
pub struct ScriptedTool {
    kind: ToolKind,
    results: Mutex<VecDeque<ToolResult>>,
    fallback: Option<ToolResult>,
    calls: Mutex<Vec<Arguments>>,
}

impl ScriptedTool {
    /// Return `results` in order, then fail.
    pub fn new(kind: ToolKind, results: impl IntoIterator<Item = ToolResult>) -> Self {
        Self {
            kind,
            results: Mutex::new(results.into_iter().collect()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return `result` for every call.
    pub fn always(kind: ToolKind, result: ToolResult) -> Self {
        Self {
            fallback: Some(result),
            ..Self::new(kind, [])
        }
    }

    pub fn calls(&self) -> Vec<Arguments> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl ToolAdapter for ScriptedTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    async fn invoke(&self, arguments: &Arguments) -> ToolResult {
        lock(&self.calls).push(arguments.clone());
        lock(&self.results)
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| ToolResult::failed(self.kind, "no scripted result left"))
    }
}
