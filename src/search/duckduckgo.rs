//! DuckDuckGo HTML search. Needs no API key.

use super::{matches_domain, SearchHit, SearchProvider, SearchRequest, Topic};
use crate::error::{PonderError, Result};
use crate::scrape::decode_entities;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument};

const DDG_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Search provider that scrapes DuckDuckGo's HTML results page.
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    endpoint: String,
    link_regex: Regex,
    snippet_regex: Regex,
    tag_regex: Regex,
}

impl DuckDuckGoSearch {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: DDG_ENDPOINT.to_string(),
            link_regex: compile(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)?,
            snippet_regex: compile(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)?,
            tag_regex: compile(r"<[^>]+>")?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Fold domain filters into the query using DuckDuckGo operators.
    fn build_query(request: &SearchRequest) -> String {
        let mut query = request.query.clone();
        if !request.include_domains.is_empty() {
            let sites = request
                .include_domains
                .iter()
                .map(|d| format!("site:{}", d))
                .collect::<Vec<_>>()
                .join(" OR ");
            query.push_str(&format!(" ({})", sites));
        }
        for domain in &request.exclude_domains {
            query.push_str(&format!(" -site:{}", domain));
        }
        query
    }

    fn clean(&self, html: &str) -> String {
        let text = self.tag_regex.replace_all(html, "");
        decode_entities(text.trim())
    }

    /// Extract hits from a results page.
    fn parse_results(&self, html: &str) -> Vec<SearchHit> {
        let snippets: Vec<String> = self
            .snippet_regex
            .captures_iter(html)
            .map(|c| self.clean(&c[1]))
            .collect();

        self.link_regex
            .captures_iter(html)
            .enumerate()
            .map(|(i, caps)| SearchHit {
                title: self.clean(&caps[2]),
                url: resolve_redirect(&decode_entities(&caps[1])),
                excerpt: snippets.get(i).cloned().unwrap_or_default(),
                image_url: None,
            })
            .filter(|hit| !hit.title.is_empty() && !hit.url.is_empty())
            .collect()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PonderError::Config(format!("Invalid regex: {}", e)))
}

/// DuckDuckGo wraps result links in `/l/?uddg=<encoded target>`.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if let Ok(parsed) = url::Url::parse(&absolute) {
        if parsed.path().starts_with("/l/") {
            if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
    }
    absolute
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    #[instrument(skip(self, request), fields(query = %request.query))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        if request.topic == Topic::News {
            debug!("DuckDuckGo HTML search has no news vertical; using general results");
        }

        let query = Self::build_query(request);
        let mut url = format!("{}?q={}", self.endpoint, urlencoding::encode(&query));
        if let Some(range) = request.time_range {
            url.push_str(&format!("&df={}", range.short()));
        }

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PonderError::ToolExecution(format!(
                "DuckDuckGo returned {}",
                status
            )));
        }
        let html = response.text().await?;

        let mut hits = self.parse_results(&html);
        if !request.exclude_domains.is_empty() {
            hits.retain(|h| !request.exclude_domains.iter().any(|d| matches_domain(&h.url, d)));
        }
        if !request.include_domains.is_empty() {
            hits.retain(|h| request.include_domains.iter().any(|d| matches_domain(&h.url, d)));
        }
        hits.truncate(request.max_results);

        debug!("DuckDuckGo returned {} results", hits.len());
        Ok(hits)
    }
}
