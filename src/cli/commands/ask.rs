//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{build_agent, AgentOverrides, Output};
use crate::config::Settings;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    model: Option<String>,
    max_depth: Option<usize>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ponder doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let agent = build_agent(&settings, &AgentOverrides { model, max_depth })?;

    // Ctrl-C stops the loop at the next model or tool call.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let spinner = (!json).then(|| Output::spinner("Thinking..."));
    let response = agent.run_with_cancel(question, &cancel).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        Output::agent_response(&response);
    }

    if !response.is_finished() {
        std::process::exit(2);
    }
    Ok(())
}
