//! Python subprocess runner.

use super::{CodeRunner, RunOutput};
use crate::error::{PonderError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Line prefix the driver uses to report the final expression value.
const RETURN_MARKER: &str = "__PONDER_RETURN_VALUE__:";

/// Reads the program from stdin, runs it, and reports the value of a
/// trailing expression the way an interactive session would.
const DRIVER: &str = r#"
import ast, sys
_src = sys.stdin.read()
_tree = ast.parse(_src, "<agent>", "exec")
_last = None
if _tree.body and isinstance(_tree.body[-1], ast.Expr):
    _last = ast.Expression(_tree.body.pop().value)
_ns = {"__name__": "__main__"}
exec(compile(_tree, "<agent>", "exec"), _ns)
if _last is not None:
    _value = eval(compile(_last, "<agent>", "eval"), _ns)
    if _value is not None:
        sys.stdout.flush()
        sys.stdout.write("\n__PONDER_RETURN_VALUE__:" + repr(_value) + "\n")
"#;

/// Runs Python source in a child interpreter.
///
/// This is process isolation only. The child is killed when the timeout
/// elapses.
pub struct ProcessRunner {
    interpreter: String,
}

impl ProcessRunner {
    pub fn new(interpreter: &str) -> Self {
        Self {
            interpreter: interpreter.to_string(),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("python3")
    }
}

/// Split the driver's return-value line off stdout.
fn split_return_value(stdout: &str) -> (String, Option<String>) {
    match stdout.rfind(RETURN_MARKER) {
        Some(idx) => {
            let value = stdout[idx + RETURN_MARKER.len()..].trim_end().to_string();
            let before = stdout[..idx].strip_suffix('\n').unwrap_or(&stdout[..idx]);
            (before.to_string(), Some(value))
        }
        None => (stdout.to_string(), None),
    }
}

#[async_trait]
impl CodeRunner for ProcessRunner {
    fn language(&self) -> &str {
        "python"
    }

    #[instrument(skip(self, source), fields(interpreter = %self.interpreter, bytes = source.len()))]
    async fn run(&self, source: &str, timeout: Duration) -> Result<RunOutput> {
        info!("Executing {} bytes of Python", source.len());

        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PonderError::ToolNotFound(self.interpreter.clone()),
                _ => PonderError::ToolExecution(format!("Failed to start interpreter: {}", e)),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("Execution timed out after {:?}", timeout);
                return Ok(RunOutput {
                    stderr: format!("Execution timed out after {} seconds", timeout.as_secs_f64()),
                    timed_out: true,
                    ..Default::default()
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (stdout, return_value) = split_return_value(&stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        debug!("Interpreter exited with {:?}", exit_code);

        Ok(RunOutput {
            stdout,
            stderr,
            return_value,
            timed_out: false,
            exit_code,
        })
    }
}
