//! Configuration settings for Ponder.

use crate::agent::AgentConfig;
use crate::error::{PonderError, Result};
use crate::llm::CompletionParams;
use crate::search::{SearchDefaults, SearchDepth, TimeRange, Topic};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub search: SearchSettings,
    pub code: CodeSettings,
    pub scrape: ScrapeSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model name sent with every completion request.
    pub model: String,
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// API key. Usually provided through the environment instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "deepseek-reasoner".to_string(),
            base_url: "https://api.deepseek.com".to_string(),
            api_key: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum number of turns (LLM calls) per request.
    pub max_depth: usize,
    /// Upper bound on the rendered size of a single tool message.
    pub max_tool_message_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_tool_message_chars: 16_000,
        }
    }
}

/// Which search backend to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// Tavily when an API key is configured, DuckDuckGo otherwise.
    #[default]
    Auto,
    Tavily,
    DuckDuckGo,
}

impl std::str::FromStr for SearchProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SearchProviderKind::Auto),
            "tavily" => Ok(SearchProviderKind::Tavily),
            "duckduckgo" | "ddg" => Ok(SearchProviderKind::DuckDuckGo),
            _ => Err(format!("Unknown search provider: {}", s)),
        }
    }
}

impl std::fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProviderKind::Auto => write!(f, "auto"),
            SearchProviderKind::Tavily => write!(f, "tavily"),
            SearchProviderKind::DuckDuckGo => write!(f, "duckduckgo"),
        }
    }
}

/// Search tool settings and request defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub provider: SearchProviderKind,
    /// Tavily API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub depth: SearchDepth,
    pub topic: Topic,
    pub time_range: Option<TimeRange>,
    pub include_images: bool,
    /// Maximum number of hits handed back to the model.
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::Auto,
            api_key: None,
            depth: SearchDepth::Basic,
            topic: Topic::General,
            time_range: None,
            include_images: false,
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

impl SearchSettings {
    /// Resolve `Auto` into a concrete provider.
    pub fn effective_provider(&self) -> SearchProviderKind {
        match self.provider {
            SearchProviderKind::Auto if self.has_api_key() => SearchProviderKind::Tavily,
            SearchProviderKind::Auto => SearchProviderKind::DuckDuckGo,
            other => other,
        }
    }

    fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// Defaults applied to search commands that omit optional fields.
    pub fn defaults(&self) -> SearchDefaults {
        SearchDefaults {
            depth: self.depth,
            topic: self.topic,
            time_range: self.time_range,
            include_images: self.include_images,
            max_results: self.max_results,
        }
    }
}

/// Code execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeSettings {
    /// Python interpreter used by the subprocess runner.
    pub interpreter: String,
    /// Wall-clock limit for a single execution.
    pub timeout_secs: u64,
    pub max_output_chars: usize,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 30,
            max_output_chars: 10_000,
        }
    }
}

/// Web scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub timeout_secs: u64,
    /// Maximum characters of extracted text kept per page.
    pub max_chars: usize,
    pub user_agent: String,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_chars: 20_000,
            user_agent: "Mozilla/5.0 (compatible; Ponder/0.1)".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject limits the tools cannot work with.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("agent.max_tool_message_chars", self.agent.max_tool_message_chars),
            ("search.max_results", self.search.max_results),
            ("code.max_output_chars", self.code.max_output_chars),
            ("scrape.max_chars", self.scrape.max_chars),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(PonderError::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    ///
    /// Later names in each list win, so `PONDER_*` beats the vendor-specific
    /// variables.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for key in ["OPENAI_API_KEY", "DEEPSEEK_API_KEY", "PONDER_API_KEY"] {
            if let Some(value) = get(key) {
                self.llm.api_key = Some(value);
            }
        }
        for key in ["OPENAI_BASE_URL", "DEEPSEEK_BASE_URL", "PONDER_BASE_URL"] {
            if let Some(value) = get(key) {
                self.llm.base_url = value;
            }
        }
        if let Some(value) = get("PONDER_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = get("TAVILY_API_KEY") {
            self.search.api_key = Some(value);
        }

        if let Some(value) = get("PONDER_MAX_DEPTH") {
            self.agent.max_depth = parse_env("PONDER_MAX_DEPTH", &value)?;
        }
        if let Some(value) = get("PONDER_SEARCH_MAX_RESULTS") {
            self.search.max_results = parse_env("PONDER_SEARCH_MAX_RESULTS", &value)?;
        }
        if let Some(value) = get("PONDER_CODE_TIMEOUT_SECS") {
            self.code.timeout_secs = parse_env("PONDER_CODE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("PONDER_CODE_MAX_OUTPUT_CHARS") {
            self.code.max_output_chars = parse_env("PONDER_CODE_MAX_OUTPUT_CHARS", &value)?;
        }
        if let Some(value) = get("PONDER_SCRAPE_TIMEOUT_SECS") {
            self.scrape.timeout_secs = parse_env("PONDER_SCRAPE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("PONDER_SCRAPE_MAX_CHARS") {
            self.scrape.max_chars = parse_env("PONDER_SCRAPE_MAX_CHARS", &value)?;
        }

        Ok(())
    }

    /// Build the explicit configuration handed to the orchestration loop.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_depth: self.agent.max_depth,
            max_tool_message_chars: self.agent.max_tool_message_chars,
            completion: CompletionParams {
                model: self.llm.model.clone(),
                temperature: self.llm.temperature,
                max_tokens: self.llm.max_tokens,
            },
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn code_timeout(&self) -> Duration {
        Duration::from_secs(self.code.timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape.timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PonderError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ponder")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PonderError::Config(format!("{} has an invalid value: {:?}", key, value)))
}
