//! Web search collaborators.

mod duckduckgo;
mod tavily;

pub use duckduckgo::DuckDuckGoSearch;
pub use tavily::TavilySearch;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How thorough the provider should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl std::str::FromStr for SearchDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            _ => Err(format!(
                "invalid search_depth '{}': expected basic or advanced",
                s
            )),
        }
    }
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// Search vertical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    #[default]
    General,
    News,
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Topic::General),
            "news" => Ok(Topic::News),
            _ => Err(format!("invalid topic '{}': expected general or news", s)),
        }
    }
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::General => "general",
            Topic::News => "news",
        }
    }
}

/// Recency filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "d" => Ok(TimeRange::Day),
            "week" | "w" => Ok(TimeRange::Week),
            "month" | "m" => Ok(TimeRange::Month),
            "year" | "y" => Ok(TimeRange::Year),
            _ => Err(format!(
                "invalid time_range '{}': expected day, week, month or year",
                s
            )),
        }
    }
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
        }
    }

    /// Single-letter form used by DuckDuckGo's `df` parameter.
    pub fn short(&self) -> &'static str {
        &self.as_str()[..1]
    }
}

/// Values used when a search command omits an optional field.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDefaults {
    pub depth: SearchDepth,
    pub topic: Topic,
    pub time_range: Option<TimeRange>,
    pub include_images: bool,
    pub max_results: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            depth: SearchDepth::Basic,
            topic: Topic::General,
            time_range: None,
            include_images: false,
            max_results: 5,
        }
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub depth: SearchDepth,
    pub topic: Topic,
    pub time_range: Option<TimeRange>,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
    pub include_images: bool,
    pub max_results: usize,
}

impl SearchRequest {
    pub fn new(query: &str, defaults: &SearchDefaults) -> Self {
        Self {
            query: query.to_string(),
            depth: defaults.depth,
            topic: defaults.topic,
            time_range: defaults.time_range,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
            include_images: defaults.include_images,
            max_results: defaults.max_results,
        }
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Trait for search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Run a search, returning hits in ranking order.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}

/// Whether `url` belongs to `domain` or one of its subdomains.
pub(crate) fn matches_domain(url: &str, domain: &str) -> bool {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));
    let domain = domain.trim().trim_start_matches("www.").to_ascii_lowercase();
    match host {
        Some(host) => {
            let host = host.trim_start_matches("www.");
            host == domain || host.ends_with(&format!(".{}", domain))
        }
        None => false,
    }
}
