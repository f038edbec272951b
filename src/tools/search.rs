//! Search adapter.

use super::{
    optional_bool, optional_str, optional_str_list, optional_usize, required_str, ToolAdapter,
    ToolOutput, ToolResult,
};
use crate::command::{Arguments, ToolKind};
use crate::error::{PonderError, Result};
use crate::search::{SearchDefaults, SearchProvider, SearchRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Validates search arguments and forwards them to a [`SearchProvider`].
pub struct SearchAdapter {
    provider: Arc<dyn SearchProvider>,
    defaults: SearchDefaults,
}

impl SearchAdapter {
    pub fn new(provider: Arc<dyn SearchProvider>, defaults: SearchDefaults) -> Self {
        Self { provider, defaults }
    }

    /// Build a request from model-supplied arguments. Enumerated fields are
    /// checked here so the provider never sees an invalid value.
    fn build_request(&self, arguments: &Arguments) -> Result<SearchRequest> {
        let query = required_str(arguments, "query")?;
        let mut request = SearchRequest::new(query.trim(), &self.defaults);

        if let Some(depth) = optional_str(arguments, "search_depth")? {
            request.depth = depth.parse().map_err(PonderError::Validation)?;
        }
        if let Some(topic) = optional_str(arguments, "topic")? {
            request.topic = topic.parse().map_err(PonderError::Validation)?;
        }
        if let Some(range) = optional_str(arguments, "time_range")? {
            request.time_range = Some(range.parse().map_err(PonderError::Validation)?);
        }
        if let Some(images) = optional_bool(arguments, "include_images")? {
            request.include_images = images;
        }
        request.include_domains = optional_str_list(arguments, "include_domains")?;
        request.exclude_domains = optional_str_list(arguments, "exclude_domains")?;

        if let Some(max) = optional_usize(arguments, "max_results")? {
            if max == 0 {
                return Err(PonderError::Validation(
                    "'max_results' must be at least 1".to_string(),
                ));
            }
            request.max_results = max.min(self.defaults.max_results);
        }

        Ok(request)
    }
}

#[async_trait]
impl ToolAdapter for SearchAdapter {
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    #[instrument(skip(self, arguments), fields(provider = self.provider.name()))]
    async fn invoke(&self, arguments: &Arguments) -> ToolResult {
        let request = match self.build_request(arguments) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected search arguments: {}", e);
                return ToolResult::failed(self.kind(), e.to_string());
            }
        };

        info!("Searching for: {}", request.query);
        match self.provider.search(&request).await {
            Ok(mut hits) => {
                hits.truncate(request.max_results);
                info!("Search returned {} results", hits.len());
                ToolResult::ok(
                    self.kind(),
                    ToolOutput::Structured(serde_json::json!({
                        "query": request.query,
                        "results": hits,
                    })),
                )
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                ToolResult::failed(self.kind(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchDepth, SearchHit, TimeRange, Topic};
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns `count` numbered hits and remembers the last request.
    struct FixedSearch {
        count: usize,
        seen: Mutex<Option<SearchRequest>>,
    }

    impl FixedSearch {
        fn new(count: usize) -> Arc<Self> {
            Arc::new(Self {
                count,
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok((0..self.count)
                .map(|i| SearchHit {
                    title: format!("Result {}", i),
                    url: format!("https://example.com/{}", i),
                    excerpt: format!("About {}", request.query),
                    image_url: None,
                })
                .collect())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>> {
            Err(PonderError::ToolExecution("rate limited".to_string()))
        }
    }

    fn args(value: serde_json::Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    fn defaults(max_results: usize) -> SearchDefaults {
        SearchDefaults {
            max_results,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_results_truncated_to_configured_maximum() {
        let provider = FixedSearch::new(8);
        let adapter = SearchAdapter::new(provider.clone(), defaults(3));

        let result = adapter.invoke(&args(json!({"query": "tokio"}))).await;
        assert!(result.success);
        let ToolOutput::Structured(payload) = &result.output else {
            panic!("expected structured output");
        };
        assert_eq!(payload["results"].as_array().unwrap().len(), 3);
        assert_eq!(payload["query"], "tokio");
    }

    #[tokio::test]
    async fn test_optional_fields_are_applied() {
        let provider = FixedSearch::new(1);
        let adapter = SearchAdapter::new(provider.clone(), defaults(5));

        let result = adapter
            .invoke(&args(json!({
                "query": "rust release",
                "search_depth": "advanced",
                "topic": "news",
                "time_range": "w",
                "include_domains": ["blog.rust-lang.org"],
                "max_results": 10
            })))
            .await;
        assert!(result.success);

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.depth, SearchDepth::Advanced);
        assert_eq!(seen.topic, Topic::News);
        assert_eq!(seen.time_range, Some(TimeRange::Week));
        assert_eq!(seen.include_domains, vec!["blog.rust-lang.org"]);
        assert_eq!(seen.max_results, 5);
    }

    #[tokio::test]
    async fn test_invalid_enum_never_reaches_provider() {
        let provider = FixedSearch::new(1);
        let adapter = SearchAdapter::new(provider.clone(), defaults(5));

        let result = adapter
            .invoke(&args(json!({"query": "x", "topic": "sports"})))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid topic"));
        assert!(provider.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let adapter = SearchAdapter::new(FixedSearch::new(1), defaults(5));
        let result = adapter.invoke(&Arguments::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("'query' is required"));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_failed_result() {
        let adapter = SearchAdapter::new(Arc::new(FailingSearch), defaults(5));
        let result = adapter.invoke(&args(json!({"query": "x"}))).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("rate limited"));
    }
}
