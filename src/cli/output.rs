//! CLI output formatting utilities.

use crate::agent::{AgentResponse, ToolCallRecord};
use crate::text::preview;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one tool call with a short preview of what it returned.
    pub fn tool_call(record: &ToolCallRecord) {
        let icon = if record.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {}", icon, style(record.to_string()).dim());

        let detail = match &record.error {
            Some(error) => error.clone(),
            None => record.output.render(),
        };
        if !detail.trim().is_empty() {
            println!("    {}", style(preview(detail.trim(), 120)).dim());
        }
    }

    /// Print an agent result: answer, then the stop reason and tools used.
    pub fn agent_response(response: &AgentResponse) {
        println!("\n{}\n", response.final_text);

        if response.confidence != crate::agent::UNSPECIFIED_CONFIDENCE {
            Output::kv("Confidence", &response.confidence);
        }
        if let Some(reason) = response.reason {
            Output::warning(&format!(
                "Stopped early ({}) after {} turns",
                reason, response.turns_used
            ));
        }
        if !response.tool_calls.is_empty() {
            Output::header("Tools used");
            for call in &response.tool_calls {
                Output::tool_call(call);
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(template);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}
