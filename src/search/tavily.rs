//! Tavily search API.

use super::{SearchHit, SearchProvider, SearchRequest};
use crate::error::{PonderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Search provider backed by the Tavily API.
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            endpoint: TAVILY_ENDPOINT.to_string(),
        })
    }

    /// Point the provider at a different endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    topic: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<&'static str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    include_domains: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    exclude_domains: &'a [String],
    include_images: bool,
    max_results: usize,
}

impl<'a> From<&'a SearchRequest> for TavilyRequest<'a> {
    fn from(request: &'a SearchRequest) -> Self {
        Self {
            query: &request.query,
            search_depth: request.depth.as_str(),
            topic: request.topic.as_str(),
            time_range: request.time_range.map(|t| t.as_str()),
            include_domains: &request.include_domains,
            exclude_domains: &request.exclude_domains,
            include_images: request.include_images,
            max_results: request.max_results,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
    #[serde(default)]
    images: Vec<TavilyImage>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily returns images either as bare URLs or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TavilyImage {
    Url(String),
    Described { url: String },
}

impl TavilyImage {
    fn url(self) -> String {
        match self {
            TavilyImage::Url(url) | TavilyImage::Described { url } => url,
        }
    }
}

impl TavilyResponse {
    fn into_hits(self) -> Vec<SearchHit> {
        let mut images = self.images.into_iter().map(TavilyImage::url);
        self.results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                excerpt: r.content,
                image_url: images.next(),
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    #[instrument(skip(self, request), fields(query = %request.query))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest::from(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PonderError::ToolExecution(format!(
                "Tavily returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TavilyResponse = response.json().await?;
        let hits = parsed.into_hits();
        debug!("Tavily returned {} results", hits.len());
        Ok(hits)
    }
}
