//! CLI module for Ponder.

mod builder;
pub mod commands;
mod output;
pub mod preflight;

pub use builder::{build_agent, AgentOverrides};
pub use output::Output;

use clap::{Parser, Subcommand};

/// Ponder - a reasoning loop for chat models
///
/// Lets a chat model search the web, run Python and read pages until it can
/// answer your question.
#[derive(Parser, Debug)]
#[command(name = "ponder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum number of model turns
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the tools available to the model
    Tools,

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from(["ponder", "-vv", "ask", "What is Rust?", "--max-depth", "3", "--json"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask {
                question,
                max_depth,
                json,
                model,
            } => {
                assert_eq!(question, "What is Rust?");
                assert_eq!(max_depth, Some(3));
                assert!(json);
                assert!(model.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::parse_from(["ponder", "--config", "/tmp/p.toml", "config", "path"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/p.toml"));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
