//! Tools command: show what the model can call and how.

use crate::cli::Output;
use crate::command::{ToolKind, FINAL_ANSWER_TAG};
use console::style;

/// Print every tool with its tag syntax and accepted arguments.
pub fn run_tools() -> anyhow::Result<()> {
    Output::header("Tools");

    for kind in ToolKind::ALL {
        println!(
            "\n  {} {}",
            style(kind.display_name()).bold(),
            style(format!("<{}>", kind.tag())).cyan()
        );
        println!("    {}", kind.description());
        println!(
            "    {}",
            style(format!(
                "Required: {}. Feedback arrives as <{}> or <{}>.",
                kind.primary_argument(),
                kind.result_tag(),
                kind.error_tag()
            ))
            .dim()
        );
        let arguments = serde_json::to_string_pretty(&kind.input_description())?;
        for line in arguments.lines() {
            println!("      {}", style(line).dim());
        }
    }

    println!(
        "\n  {} {}",
        style("Final Answer").bold(),
        style(format!("<{}>", FINAL_ANSWER_TAG)).cyan()
    );
    println!("    Ends the run. Plain text without tags is also accepted as an answer.");

    Ok(())
}
