//! Code-execution adapter.

use super::{optional_str, required_str, ToolAdapter, ToolOutput, ToolResult};
use crate::command::{Arguments, ToolKind};
use crate::error::{PonderError, Result};
use crate::sandbox::{CodeRunner, RunOutput};
use crate::text::truncate_with_marker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Extra time allowed beyond the runner's own timeout before the adapter
/// abandons the call.
const DEFAULT_GUARD_GRACE: Duration = Duration::from_secs(5);

/// Runs model-written code through a [`CodeRunner`].
pub struct CodeAdapter {
    runner: Arc<dyn CodeRunner>,
    timeout: Duration,
    guard_grace: Duration,
    max_output_chars: usize,
}

impl CodeAdapter {
    pub fn new(runner: Arc<dyn CodeRunner>, timeout: Duration, max_output_chars: usize) -> Self {
        Self {
            runner,
            timeout,
            guard_grace: DEFAULT_GUARD_GRACE,
            max_output_chars,
        }
    }

    pub fn with_guard_grace(mut self, grace: Duration) -> Self {
        self.guard_grace = grace;
        self
    }

    fn source<'a>(&self, arguments: &'a Arguments) -> Result<&'a str> {
        if let Some(language) = optional_str(arguments, "language")? {
            if !language.eq_ignore_ascii_case(self.runner.language()) {
                return Err(PonderError::Validation(format!(
                    "unsupported language '{}': only {} is available",
                    language,
                    self.runner.language()
                )));
            }
        }
        required_str(arguments, "code")
    }

    fn to_result(&self, run: RunOutput) -> ToolResult {
        let stdout = truncate_with_marker(run.stdout.trim_end(), self.max_output_chars);
        let stderr = truncate_with_marker(run.stderr.trim_end(), self.max_output_chars);

        let mut payload = serde_json::Map::new();
        payload.insert("stdout".into(), stdout.into());
        if !stderr.is_empty() {
            payload.insert("stderr".into(), stderr.clone().into());
        }
        if let Some(value) = &run.return_value {
            payload.insert(
                "return_value".into(),
                truncate_with_marker(value, self.max_output_chars).into(),
            );
        }
        if let Some(code) = run.exit_code {
            payload.insert("exit_code".into(), code.into());
        }
        let output = ToolOutput::Structured(payload.into());

        if run.timed_out {
            warn!("Code execution timed out");
            return ToolResult::failed_with_output(
                self.kind(),
                output,
                format!(
                    "Execution timed out after {} seconds",
                    self.timeout.as_secs_f64()
                ),
            );
        }

        if run.succeeded() {
            return ToolResult::ok(self.kind(), output);
        }

        let error = if stderr.is_empty() {
            match run.exit_code {
                Some(code) => format!("Process exited with code {}", code),
                None => "Process was terminated by a signal".to_string(),
            }
        } else {
            stderr
        };
        warn!("Code execution failed: {:?}", run.exit_code);
        ToolResult::failed_with_output(self.kind(), output, error)
    }
}

#[async_trait]
impl ToolAdapter for CodeAdapter {
    fn kind(&self) -> ToolKind {
        ToolKind::ExecuteCode
    }

    #[instrument(skip(self, arguments))]
    async fn invoke(&self, arguments: &Arguments) -> ToolResult {
        let source = match self.source(arguments) {
            Ok(source) => source,
            Err(e) => return ToolResult::failed(self.kind(), e.to_string()),
        };

        info!("Running {} lines of code", source.lines().count());
        let guard = self.timeout + self.guard_grace;
        match tokio::time::timeout(guard, self.runner.run(source, self.timeout)).await {
            Ok(Ok(run)) => self.to_result(run),
            Ok(Err(e)) => {
                warn!("Code runner failed: {}", e);
                ToolResult::failed(self.kind(), e.to_string())
            }
            Err(_) => {
                warn!("Code runner ignored its timeout; abandoned after {:?}", guard);
                ToolResult::failed(
                    self.kind(),
                    format!(
                        "Execution timed out after {} seconds",
                        self.timeout.as_secs_f64()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Returns a fixed output regardless of the source.
    struct CannedRunner(RunOutput);

    #[async_trait]
    impl CodeRunner for CannedRunner {
        fn language(&self) -> &str {
            "python"
        }

        async fn run(&self, _source: &str, _timeout: Duration) -> Result<RunOutput> {
            Ok(self.0.clone())
        }
    }

    /// Never finishes, to exercise the guard timeout.
    struct HangingRunner;

    #[async_trait]
    impl CodeRunner for HangingRunner {
        fn language(&self) -> &str {
            "python"
        }

        async fn run(&self, _source: &str, _timeout: Duration) -> Result<RunOutput> {
            futures::future::pending().await
        }
    }

    fn adapter(run: RunOutput) -> CodeAdapter {
        CodeAdapter::new(Arc::new(CannedRunner(run)), Duration::from_secs(5), 100)
    }

    fn code(source: &str) -> Arguments {
        serde_json::from_value(json!({ "code": source })).unwrap()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let result = adapter(RunOutput {
            stdout: "hello\n".into(),
            return_value: Some("42".into()),
            exit_code: Some(0),
            ..Default::default()
        })
        .invoke(&code("print('hello')\n6 * 7"))
        .await;

        assert!(result.success);
        let ToolOutput::Structured(payload) = &result.output else {
            panic!("expected structured output");
        };
        assert_eq!(payload["stdout"], "hello");
        assert_eq!(payload["return_value"], "42");
        assert_eq!(payload["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_runtime_fault_reports_stderr() {
        let result = adapter(RunOutput {
            stderr: "Traceback (most recent call last):\nZeroDivisionError: division by zero\n"
                .into(),
            exit_code: Some(1),
            ..Default::default()
        })
        .invoke(&code("1/0"))
        .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let result = adapter(RunOutput {
            timed_out: true,
            ..Default::default()
        })
        .invoke(&code("while True: pass"))
        .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let result = adapter(RunOutput {
            stdout: "x".repeat(500),
            exit_code: Some(0),
            ..Default::default()
        })
        .invoke(&code("print('x' * 500)"))
        .await;

        let rendered = result.output.render();
        assert!(rendered.contains("content truncated at 100 characters"));
    }

    #[tokio::test]
    async fn test_unsupported_language_is_rejected() {
        let args = serde_json::from_value(json!({"code": "puts 1", "language": "ruby"})).unwrap();
        let result = adapter(RunOutput::default()).invoke(&args).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unsupported language 'ruby'"));
    }

    #[tokio::test]
    async fn test_guard_timeout_abandons_hung_runner() {
        let adapter = CodeAdapter::new(Arc::new(HangingRunner), Duration::from_millis(20), 100)
            .with_guard_grace(Duration::from_millis(20));
        let result = adapter.invoke(&code("import time; time.sleep(100)")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }
}
