//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{SearchProviderKind, Settings};
use crate::text::preview;
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Ponder Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections = [
        ("Language Model", vec![check_api_key(settings), check_endpoint(settings)]),
        ("Tools", vec![
            check_interpreter(&settings.code.interpreter),
            check_search_provider(settings),
        ]),
        ("Configuration", vec![check_config_file(config_path)]),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Ponder.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Ponder is ready to use.");
    }

    Ok(())
}

/// Check that the Python interpreter is available.
fn check_interpreter(name: &str) -> CheckResult {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => {
            // Older Pythons print the version on stderr.
            let text = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let version = String::from_utf8_lossy(&text)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok(name, &preview(&version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", install_hint_python()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", install_hint_python())
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), install_hint_python()),
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check that an API key is configured for the completion endpoint.
fn check_api_key(settings: &Settings) -> CheckResult {
    match settings.llm.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            CheckResult::ok("API key", &format!("configured ({})", mask(key)))
        }
        Some(_) => CheckResult::error(
            "API key",
            "empty",
            "Set with: export DEEPSEEK_API_KEY='sk-...'",
        ),
        None => CheckResult::error(
            "API key",
            "not set",
            "Set with: export DEEPSEEK_API_KEY='sk-...' (or OPENAI_API_KEY)",
        ),
    }
}

fn check_endpoint(settings: &Settings) -> CheckResult {
    match url::Url::parse(&settings.llm.base_url) {
        Ok(_) => CheckResult::ok(
            "Endpoint",
            &format!("{} (model {})", settings.llm.base_url, settings.llm.model),
        ),
        Err(e) => CheckResult::error(
            "Endpoint",
            &format!("invalid base_url: {}", e),
            "Fix llm.base_url in the config file or PONDER_BASE_URL",
        ),
    }
}

fn check_search_provider(settings: &Settings) -> CheckResult {
    let has_key = settings
        .search
        .api_key
        .as_ref()
        .is_some_and(|k| !k.is_empty());
    match (settings.search.effective_provider(), has_key) {
        (SearchProviderKind::Tavily, true) => CheckResult::ok("Search", "tavily"),
        (SearchProviderKind::Tavily, false) => CheckResult::error(
            "Search",
            "tavily selected but no API key",
            "Set with: export TAVILY_API_KEY='tvly-...'",
        ),
        _ => CheckResult::warning(
            "Search",
            "duckduckgo (no API key needed, results may be rate limited)",
            "Set TAVILY_API_KEY for more reliable search",
        ),
    }
}

fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: ponder config edit",
        )
    }
}

/// Platform-specific install hint for Python.
fn install_hint_python() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install python"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install python3 (or your package manager)"
    } else {
        "Install from: https://www.python.org/downloads/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_mask_hides_middle() {
        assert_eq!(mask("sk-abcdefghijklmnop"), "sk-abc...mnop");
        assert_eq!(mask("short"), "****");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let result = check_api_key(&Settings::default());
        assert_eq!(result.status, CheckStatus::Error);
    }

    #[test]
    fn test_search_provider_checks() {
        let mut settings = Settings::default();
        assert_eq!(check_search_provider(&settings).status, CheckStatus::Warning);

        settings.search.api_key = Some("tvly-123".to_string());
        assert_eq!(check_search_provider(&settings).status, CheckStatus::Ok);

        settings.search.api_key = None;
        settings.search.provider = SearchProviderKind::Tavily;
        assert_eq!(check_search_provider(&settings).status, CheckStatus::Error);
    }
}
