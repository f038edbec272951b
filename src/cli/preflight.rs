//! Pre-flight checks before talking to the model.
//!
//! Catches missing keys and interpreters up front instead of letting the
//! first turn fail.

use crate::config::Settings;
use crate::error::{PonderError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Asking or chatting needs an API key and a Python interpreter.
    Ask,
    /// Listing tools has no external requirements.
    Inspect,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_api_key(settings)?;
            check_interpreter(&settings.code.interpreter)?;
        }
        Operation::Inspect => {}
    }
    Ok(())
}

/// The key must be configured unless the endpoint is a local server.
fn check_api_key(settings: &Settings) -> Result<()> {
    let local = is_local_endpoint(&settings.llm.base_url);
    match settings.llm.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ if local => Ok(()),
        _ => Err(PonderError::Config(
            "No API key configured. Set it with: export DEEPSEEK_API_KEY='sk-...'".to_string(),
        )),
    }
}

fn is_local_endpoint(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"))
}

/// Check that the Python interpreter runs.
pub fn check_interpreter(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(PonderError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PonderError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(PonderError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_has_no_requirements() {
        assert!(check(Operation::Inspect, &Settings::default()).is_ok());
    }

    #[test]
    fn test_missing_key_fails_for_remote_endpoint() {
        let settings = Settings::default();
        let err = check_api_key(&settings).unwrap_err();
        assert!(matches!(err, PonderError::Config(_)));
    }

    #[test]
    fn test_local_endpoint_needs_no_key() {
        let mut settings = Settings::default();
        settings.llm.base_url = "http://localhost:11434/v1".to_string();
        assert!(check_api_key(&settings).is_ok());
    }

    #[test]
    fn test_missing_interpreter() {
        let err = check_interpreter("no-such-python-here").unwrap_err();
        assert!(matches!(err, PonderError::ToolNotFound(_)));
    }
}
