//! Code-execution collaborators.

mod process;

pub use process::ProcessRunner;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a single execution produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// `repr` of the final expression, when the program ends with one.
    pub return_value: Option<String>,
    pub timed_out: bool,
    /// Process exit code. `None` when killed or timed out.
    pub exit_code: Option<i32>,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Trait for code runners.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Language this runner executes.
    fn language(&self) -> &str;

    /// Run `source`, giving up after `timeout`.
    async fn run(&self, source: &str, timeout: Duration) -> Result<RunOutput>;
}
