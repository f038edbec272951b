//! Tool adapters: a uniform call/result contract over the collaborators.
//!
//! Adapters never return `Err` and never let a panic escape the
//! [`Toolbox`]. Every failure comes back as a [`ToolResult`] with
//! `success == false`, which the agent loop feeds back to the model.

mod code;
mod scrape;
mod search;

pub use code::CodeAdapter;
pub use scrape::ScrapeAdapter;
pub use search::SearchAdapter;

use crate::command::{tool_catalog, Arguments, ToolKind};
use crate::error::{PonderError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Tool output, either prose or a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
}

impl ToolOutput {
    pub fn empty() -> Self {
        ToolOutput::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ToolOutput::Text(text) => text.trim().is_empty(),
            ToolOutput::Structured(value) => value.is_null(),
        }
    }

    /// Text form shown to the model.
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_kind: ToolKind,
    pub success: bool,
    pub output: ToolOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_kind: ToolKind, output: ToolOutput) -> Self {
        Self {
            tool_kind,
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(tool_kind: ToolKind, error: impl Into<String>) -> Self {
        Self::failed_with_output(tool_kind, ToolOutput::empty(), error)
    }

    /// A failure that still carries whatever the tool produced.
    pub fn failed_with_output(
        tool_kind: ToolKind,
        output: ToolOutput,
        error: impl Into<String>,
    ) -> Self {
        Self {
            tool_kind,
            success: false,
            output,
            error: Some(error.into()),
        }
    }

    /// Body of the feedback message sent back to the model.
    pub fn feedback_body(&self) -> String {
        match (&self.error, self.output.is_empty()) {
            (None, true) => "(no output)".to_string(),
            (None, false) => self.output.render(),
            (Some(error), true) => error.clone(),
            (Some(error), false) => format!("{}\n\n{}", error, self.output.render()),
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Trait for tool adapters.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// The tool kind this adapter serves.
    fn kind(&self) -> ToolKind;

    /// Run the tool. Failures are reported in the result, not as `Err`.
    async fn invoke(&self, arguments: &Arguments) -> ToolResult;
}

/// The set of adapters available to one agent, keyed by tool kind.
#[derive(Default, Clone)]
pub struct Toolbox {
    adapters: BTreeMap<ToolKind, Arc<dyn ToolAdapter>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter, replacing any previous one for the same kind.
    pub fn with(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn register(&mut self, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.adapters.keys().copied().collect()
    }

    /// Prompt text describing the registered tools.
    pub fn catalog(&self) -> String {
        tool_catalog(&self.kinds())
    }

    /// Dispatch to the adapter for `kind`.
    pub async fn invoke(&self, kind: ToolKind, arguments: &Arguments) -> ToolResult {
        let Some(adapter) = self.adapters.get(&kind) else {
            warn!("No adapter registered for {}", kind);
            return ToolResult::failed(
                kind,
                format!("Tool '{}' is not available in this session", kind),
            );
        };

        debug!("Invoking {} with {:?}", kind, arguments);
        match AssertUnwindSafe(adapter.invoke(arguments)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!("Adapter for {} panicked", kind);
                ToolResult::failed(kind, format!("Tool '{}' crashed unexpectedly", kind))
            }
        }
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn invalid(message: String) -> PonderError {
    PonderError::Validation(message)
}

/// A required, non-empty string argument.
pub(crate) fn required_str<'a>(arguments: &'a Arguments, name: &str) -> Result<&'a str> {
    match optional_str(arguments, name)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(invalid(format!("'{}' is required", name))),
    }
}

pub(crate) fn optional_str<'a>(arguments: &'a Arguments, name: &str) -> Result<Option<&'a str>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(invalid(format!("'{}' must be a string, got {}", name, other))),
    }
}

pub(crate) fn optional_bool(arguments: &Arguments, name: &str) -> Result<Option<bool>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(invalid(format!("'{}' must be true or false", name))),
        },
        Some(other) => Err(invalid(format!("'{}' must be a boolean, got {}", name, other))),
    }
}

pub(crate) fn optional_usize(arguments: &Arguments, name: &str) -> Result<Option<usize>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid(format!("'{}' must be a non-negative integer", name))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(format!("'{}' must be a non-negative integer", name))),
        Some(other) => Err(invalid(format!("'{}' must be an integer, got {}", name, other))),
    }
}

/// A list of strings. A single comma-separated string is accepted too.
pub(crate) fn optional_str_list(arguments: &Arguments, name: &str) -> Result<Vec<String>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(invalid(format!(
                    "'{}' must contain only strings, got {}",
                    name, other
                ))),
            })
            .collect(),
        Some(other) => Err(invalid(format!(
            "'{}' must be a list of strings, got {}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct PanickingTool;

    #[async_trait]
    impl ToolAdapter for PanickingTool {
        fn kind(&self) -> ToolKind {
            ToolKind::Scrape
        }

        async fn invoke(&self, _arguments: &Arguments) -> ToolResult {
            panic!("adapter bug");
        }
    }

    fn args(value: Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_missing_adapter_is_a_failed_result() {
        let toolbox = Toolbox::new();
        let result = toolbox.invoke(ToolKind::Search, &Arguments::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_contained() {
        let toolbox = Toolbox::new().with(Arc::new(PanickingTool));
        let result = toolbox.invoke(ToolKind::Scrape, &Arguments::new()).await;
        assert!(!result.success);
        assert_eq!(result.tool_kind, ToolKind::Scrape);
    }

    #[test]
    fn test_catalog_lists_registered_tools_only() {
        let toolbox = Toolbox::new().with(Arc::new(PanickingTool));
        let catalog = toolbox.catalog();
        assert!(catalog.contains("<scrape>"));
        assert!(!catalog.contains("<search>"));
    }

    #[test]
    fn test_feedback_body() {
        let ok = ToolResult::ok(ToolKind::Search, ToolOutput::Structured(json!({"a": 1})));
        assert_eq!(ok.feedback_body(), "{\n  \"a\": 1\n}");

        let failed = ToolResult::failed(ToolKind::ExecuteCode, "NameError: x");
        assert_eq!(failed.feedback_body(), "NameError: x");

        let empty = ToolResult::ok(ToolKind::ExecuteCode, ToolOutput::empty());
        assert_eq!(empty.feedback_body(), "(no output)");
    }

    #[test]
    fn test_payload_shape() {
        let result = ToolResult::failed(ToolKind::Scrape, "HTTP error: 404 Not Found");
        let payload = result.to_payload();
        assert_eq!(payload["tool_kind"], "scrape");
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"], "HTTP error: 404 Not Found");
    }

    #[test]
    fn test_argument_helpers() {
        let a = args(json!({
            "query": "rust",
            "blank": "  ",
            "flag": "TRUE",
            "count": "3",
            "domains": "docs.rs, crates.io",
            "list": ["a", "b"],
            "bad_list": [1]
        }));

        assert_eq!(required_str(&a, "query").unwrap(), "rust");
        assert!(required_str(&a, "blank").is_err());
        assert!(required_str(&a, "missing").is_err());
        assert_eq!(optional_bool(&a, "flag").unwrap(), Some(true));
        assert_eq!(optional_usize(&a, "count").unwrap(), Some(3));
        assert!(optional_usize(&a, "query").is_err());
        assert_eq!(optional_str_list(&a, "domains").unwrap(), vec!["docs.rs", "crates.io"]);
        assert_eq!(optional_str_list(&a, "list").unwrap(), vec!["a", "b"]);
        assert!(optional_str_list(&a, "bad_list").is_err());
        assert!(optional_str_list(&a, "missing").unwrap().is_empty());
    }
}
