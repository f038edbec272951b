//! Interactive chat command. History is carried between questions.

use crate::agent::Agent;
use crate::cli::preflight::{self, Operation};
use crate::cli::{build_agent, AgentOverrides, Output};
use crate::config::Settings;
use crate::conversation::{Message, Role};
use console::style;
use std::io::{self, BufRead, Write};
use tokio_util::sync::CancellationToken;

/// Keep at most this many carried messages between questions.
const MAX_HISTORY_MESSAGES: usize = 40;

/// Run the interactive chat command.
pub async fn run_chat(model: Option<String>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ponder doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let agent = build_agent(
        &settings,
        &AgentOverrides {
            model,
            max_depth: None,
        },
    )?;
    let mut chat = ChatSession::new(agent);

    println!("\n{}", style("Ponder Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            chat.clear_history();
            Output::info("Conversation history cleared.");
            continue;
        }

        chat.send_message(input).await;
    }

    Ok(())
}

/// Chat session that threads history through successive agent runs.
struct ChatSession {
    agent: Agent,
    history: Vec<Message>,
}

impl ChatSession {
    fn new(agent: Agent) -> Self {
        Self {
            agent,
            history: Vec::new(),
        }
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }

    async fn send_message(&mut self, input: &str) {
        let spinner = Output::spinner("Thinking...");
        let history = std::mem::take(&mut self.history);
        let (response, history) = self
            .agent
            .run_with_history(history, input, &CancellationToken::new())
            .await;
        spinner.finish_and_clear();

        for call in &response.tool_calls {
            Output::tool_call(call);
        }
        println!("\n{} {}\n", style("Ponder:").cyan().bold(), response.final_text);
        if let Some(reason) = response.reason {
            Output::warning(&format!("Stopped early ({})", reason));
        }

        self.history = trim_history(history, MAX_HISTORY_MESSAGES);
    }
}

/// Keep the system prompt and the most recent messages, starting at a user
/// message so no tool output is separated from the reply that caused it.
fn trim_history(history: Vec<Message>, max_messages: usize) -> Vec<Message> {
    if history.len() <= max_messages {
        return history;
    }

    let mut start = history.len() - max_messages;
    while start < history.len() && history[start].role != Role::User {
        start += 1;
    }

    let mut trimmed: Vec<Message> = history
        .first()
        .filter(|m| m.role == Role::System)
        .cloned()
        .into_iter()
        .collect();
    trimmed.extend(history.into_iter().skip(start));
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_history_keeps_system_and_starts_at_user() {
        let mut history = vec![Message::system("sys")];
        for i in 0..10 {
            history.push(Message::user(format!("q{}", i)));
            history.push(Message::assistant("<search>x</search>"));
            history.push(Message::tool(None, "result", None));
            history.push(Message::assistant(format!("a{}", i)));
        }

        let trimmed = trim_history(history, 6);
        assert_eq!(trimmed[0].content, "sys");
        assert_eq!(trimmed[1].content, "q9");
        assert_eq!(trimmed.len(), 5);
    }

    #[test]
    fn test_short_history_untouched() {
        let history = vec![Message::user("q"), Message::assistant("a")];
        assert_eq!(trim_history(history.clone(), 10), history);
    }
}
