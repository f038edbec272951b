//! Tool-tag protocol between free-form model output and the agent loop.
//!
//! The model speaks to the loop through delimited tags such as
//! `<search>{"query": "rust async"}</search>` or
//! `<final_answer>...</final_answer>`. This module defines the command types
//! and the parser that extracts them.

mod parser;

pub use parser::{parse_reply, FINAL_ANSWER_TAG, THINK_TAG};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Named tool arguments, in a stable order.
pub type Arguments = BTreeMap<String, serde_json::Value>;

/// The tools a model can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Search,
    ExecuteCode,
    Scrape,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Search, ToolKind::ExecuteCode, ToolKind::Scrape];

    /// Canonical tag name.
    pub fn tag(&self) -> &'static str {
        match self {
            ToolKind::Search => "search",
            ToolKind::ExecuteCode => "execute_code",
            ToolKind::Scrape => "scrape",
        }
    }

    /// Resolve a tag name, accepting the older aliases models were prompted with.
    pub fn from_tag(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "search" | "internet_search" | "web_search" => Some(ToolKind::Search),
            "execute_code" | "code_executer" | "code_execution" | "python" => {
                Some(ToolKind::ExecuteCode)
            }
            "scrape" | "scraping" | "fetch_url" => Some(ToolKind::Scrape),
            _ => None,
        }
    }

    /// Tag used to wrap this tool's output when it is fed back to the model.
    pub fn result_tag(&self) -> String {
        format!("{}.result", self.tag())
    }

    /// Tag used to wrap this tool's failures when they are fed back to the model.
    pub fn error_tag(&self) -> String {
        format!("{}.error", self.tag())
    }

    /// The argument every command of this kind must carry.
    ///
    /// A plain-text tag body is bound to this argument.
    pub fn primary_argument(&self) -> &'static str {
        match self {
            ToolKind::Search => "query",
            ToolKind::ExecuteCode => "code",
            ToolKind::Scrape => "url",
        }
    }

    /// Older argument names rewritten to the current ones.
    pub(crate) fn argument_aliases(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ToolKind::Search => &[("keywords", "query"), ("timelimit", "time_range")],
            ToolKind::ExecuteCode => &[("source", "code")],
            ToolKind::Scrape => &[("link", "url")],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::Search => "Internet Search",
            ToolKind::ExecuteCode => "Code Executor",
            ToolKind::Scrape => "Website Scraping",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::Search => "Search the internet for the answer to the question.",
            ToolKind::ExecuteCode => {
                "Execute Python code and return its output. Print the values you need to see."
            }
            ToolKind::Scrape => {
                "Fetch a specific web page and return its readable text. \
                 Use it when a search result needs more detail."
            }
        }
    }

    /// JSON description of the accepted arguments, shown in the system prompt.
    pub fn input_description(&self) -> serde_json::Value {
        match self {
            ToolKind::Search => serde_json::json!({
                "query": "string, required",
                "search_depth": "basic | advanced",
                "topic": "general | news",
                "time_range": "day | week | month | year",
                "include_domains": ["example.com"],
                "exclude_domains": ["example.org"],
                "include_images": false,
                "max_results": 5
            }),
            ToolKind::ExecuteCode => serde_json::json!({
                "code": "string, required: Python source",
                "language": "python"
            }),
            ToolKind::Scrape => serde_json::json!({
                "url": "string, required: http or https URL",
                "max_chars": 20000,
                "raw": false
            }),
        }
    }

    /// Prompt block describing how to invoke this tool.
    pub fn prompt_block(&self) -> String {
        format!(
            "Function {}: {}\n<{}>{}</{}>",
            self.display_name(),
            self.description(),
            self.tag(),
            self.input_description(),
            self.tag()
        )
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Prompt text listing the given tools plus the final-answer tag.
pub fn tool_catalog(kinds: &[ToolKind]) -> String {
    let mut blocks: Vec<String> = kinds.iter().map(|k| k.prompt_block()).collect();
    blocks.push(format!(
        "Function Final Answer: Return the final answer to the question, only if you are sure about it.\n<{}>The answer in markdown.</{}>",
        FINAL_ANSWER_TAG, FINAL_ANSWER_TAG
    ));
    blocks.join("\n\n")
}

/// A tool invocation extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub tool_kind: ToolKind,
    pub arguments: Arguments,
}

impl ToolCommand {
    pub fn new(tool_kind: ToolKind, arguments: Arguments) -> Self {
        Self {
            tool_kind,
            arguments,
        }
    }

    /// Convenience constructor for a command with only its primary argument.
    pub fn with_primary(tool_kind: ToolKind, value: &str) -> Self {
        let mut arguments = Arguments::new();
        arguments.insert(
            tool_kind.primary_argument().to_string(),
            serde_json::Value::String(value.to_string()),
        );
        Self::new(tool_kind, arguments)
    }

    /// Render the command back into tag form.
    pub fn to_tag(&self) -> String {
        let body = serde_json::to_string(&self.arguments).unwrap_or_else(|_| "{}".to_string());
        format!("<{}>{}</{}>", self.tool_kind.tag(), body, self.tool_kind.tag())
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let args = serde_json::to_string(&self.arguments).unwrap_or_default();
        write!(f, "{}({})", self.tool_kind, args)
    }
}

/// Confidence and free-form metadata attached to a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub confidence: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.confidence.is_none() && self.metadata.is_empty()
    }
}

/// How a model reply was classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    /// A well-formed tool command. Takes precedence over any answer text.
    Command(ToolCommand),
    /// A terminal answer, either tagged or plain text.
    Answer(String),
    /// Neither a command nor a usable answer.
    Unclassified,
}

/// Result of parsing one assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub kind: ReplyKind,
    /// Human-readable text outside tool tags and reasoning blocks.
    pub residual: String,
    pub annotations: Annotations,
}

impl ParsedReply {
    pub fn command(&self) -> Option<&ToolCommand> {
        match &self.kind {
            ReplyKind::Command(command) => Some(command),
            _ => None,
        }
    }
}

/// A malformed tool tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("tag <{tag}> is missing its closing </{tag}>")]
    MissingClosingTag { tag: String },

    #[error("unknown tool <{tag}>; available tools are search, execute_code and scrape")]
    UnknownTool { tag: String },

    #[error("<{tag}> requires a non-empty '{argument}' argument")]
    MissingArgument { tag: String, argument: String },

    #[error("<{tag}> has invalid arguments: {reason}")]
    InvalidArguments { tag: String, reason: String },

    #[error("<final_answer> must not be empty")]
    EmptyFinalAnswer,
}
