//! Wires settings into a ready-to-run [`Agent`].

use crate::agent::Agent;
use crate::config::{Prompts, SearchProviderKind, Settings};
use crate::error::{PonderError, Result};
use crate::llm::OpenAiChatModel;
use crate::sandbox::ProcessRunner;
use crate::scrape::HttpFetcher;
use crate::search::{DuckDuckGoSearch, SearchProvider, TavilySearch};
use crate::tools::{CodeAdapter, ScrapeAdapter, SearchAdapter, Toolbox};
use std::sync::Arc;
use tracing::info;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct AgentOverrides {
    pub model: Option<String>,
    pub max_depth: Option<usize>,
}

/// Pick the search backend the settings ask for.
fn search_provider(settings: &Settings) -> Result<Arc<dyn SearchProvider>> {
    let provider: Arc<dyn SearchProvider> = match settings.search.effective_provider() {
        SearchProviderKind::Tavily => {
            let key = settings.search.api_key.as_deref().ok_or_else(|| {
                PonderError::Config(
                    "search.provider is tavily but no API key is set (TAVILY_API_KEY)".to_string(),
                )
            })?;
            Arc::new(TavilySearch::new(key, settings.search_timeout())?)
        }
        SearchProviderKind::DuckDuckGo | SearchProviderKind::Auto => Arc::new(
            DuckDuckGoSearch::new(&settings.scrape.user_agent, settings.search_timeout())?,
        ),
    };
    info!("Using search provider: {}", provider.name());
    Ok(provider)
}

/// Build the toolbox with every tool enabled.
pub fn build_toolbox(settings: &Settings) -> Result<Toolbox> {
    let search = SearchAdapter::new(search_provider(settings)?, settings.search.defaults());
    let code = CodeAdapter::new(
        Arc::new(ProcessRunner::new(&settings.code.interpreter)),
        settings.code_timeout(),
        settings.code.max_output_chars,
    );
    let scrape = ScrapeAdapter::new(
        Arc::new(HttpFetcher::new(
            &settings.scrape.user_agent,
            settings.scrape_timeout(),
        )?),
        settings.scrape.max_chars,
    );

    Ok(Toolbox::new()
        .with(Arc::new(search))
        .with(Arc::new(code))
        .with(Arc::new(scrape)))
}

/// Build an agent from settings plus command-line overrides.
pub fn build_agent(settings: &Settings, overrides: &AgentOverrides) -> Result<Agent> {
    let mut config = settings.agent_config();
    if let Some(model) = &overrides.model {
        config.completion.model = model.clone();
    }
    if let Some(depth) = overrides.max_depth {
        config.max_depth = depth;
    }

    let model = OpenAiChatModel::new(
        &settings.llm.base_url,
        settings.llm.api_key.as_deref(),
        settings.llm_timeout(),
    )?;
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    info!(
        "Agent ready: model {}, max depth {}",
        config.completion.model, config.max_depth
    );
    Ok(Agent::new(Arc::new(model), build_toolbox(settings)?, config).with_prompts(prompts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolKind;

    #[test]
    fn test_overrides_apply() {
        let settings = Settings::default();
        let overrides = AgentOverrides {
            model: Some("deepseek-chat".to_string()),
            max_depth: Some(3),
        };
        let agent = build_agent(&settings, &overrides).unwrap();
        assert_eq!(agent.config().completion.model, "deepseek-chat");
        assert_eq!(agent.config().max_depth, 3);
        assert_eq!(agent.tools().kinds(), ToolKind::ALL.to_vec());
    }

    #[test]
    fn test_tavily_without_key_is_a_config_error() {
        let mut settings = Settings::default();
        settings.search.provider = SearchProviderKind::Tavily;
        let err = build_toolbox(&settings).unwrap_err();
        assert!(matches!(err, PonderError::Config(_)));
    }
}
