//! Scrape adapter.

use super::{optional_bool, optional_usize, required_str, ToolAdapter, ToolOutput, ToolResult};
use crate::command::{Arguments, ToolKind};
use crate::error::{PonderError, Result};
use crate::scrape::{PageFetcher, ScrapeOptions};
use crate::text::truncation_marker;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

/// Fetches a page through a [`PageFetcher`] and returns its readable text.
pub struct ScrapeAdapter {
    fetcher: Arc<dyn PageFetcher>,
    max_chars: usize,
}

impl ScrapeAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_chars: usize) -> Self {
        Self { fetcher, max_chars }
    }

    fn request(&self, arguments: &Arguments) -> Result<(Url, ScrapeOptions)> {
        let raw_url = required_str(arguments, "url")?.trim();
        let url = Url::parse(raw_url)
            .map_err(|e| PonderError::Validation(format!("invalid url '{}': {}", raw_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PonderError::Validation(format!(
                "unsupported url scheme '{}': only http and https are allowed",
                url.scheme()
            )));
        }

        let max_chars = optional_usize(arguments, "max_chars")?
            .map(|requested| requested.min(self.max_chars).max(1))
            .unwrap_or(self.max_chars);
        let raw = optional_bool(arguments, "raw")?.unwrap_or(false);

        Ok((
            url,
            ScrapeOptions {
                max_chars: Some(max_chars),
                raw,
            },
        ))
    }
}

#[async_trait]
impl ToolAdapter for ScrapeAdapter {
    fn kind(&self) -> ToolKind {
        ToolKind::Scrape
    }

    #[instrument(skip(self, arguments))]
    async fn invoke(&self, arguments: &Arguments) -> ToolResult {
        let (url, options) = match self.request(arguments) {
            Ok(request) => request,
            Err(e) => return ToolResult::failed(self.kind(), e.to_string()),
        };

        info!("Scraping {}", url);
        match self.fetcher.fetch_and_extract(url.as_str(), &options).await {
            Ok(page) => {
                let mut text = page.text;
                if text.trim().is_empty() {
                    return ToolResult::ok(
                        self.kind(),
                        ToolOutput::Text("(the page has no readable text)".to_string()),
                    );
                }
                if page.truncated {
                    text.push_str(&truncation_marker(options.max_chars.unwrap_or(self.max_chars)));
                }
                ToolResult::ok(self.kind(), ToolOutput::Text(text))
            }
            Err(e) => {
                warn!("Scrape of {} failed: {}", url, e);
                ToolResult::failed(self.kind(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::ExtractedPage;
    use crate::text::truncate_chars;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves one fixed body and records the options it was called with.
    struct FixedPage {
        body: String,
        seen: Mutex<Option<(String, ScrapeOptions)>>,
    }

    impl FixedPage {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for FixedPage {
        async fn fetch_and_extract(&self, url: &str, options: &ScrapeOptions) -> Result<ExtractedPage> {
            *self.seen.lock().unwrap() = Some((url.to_string(), options.clone()));
            let (text, truncated) = match options.max_chars {
                Some(max) => truncate_chars(&self.body, max),
                None => (self.body.clone(), false),
            };
            Ok(ExtractedPage {
                text,
                truncated,
                content_type: Some("text/html".to_string()),
            })
        }
    }

    fn args(value: serde_json::Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_scrape_returns_text() {
        let adapter = ScrapeAdapter::new(FixedPage::new("Tokio docs"), 100);
        let result = adapter.invoke(&args(json!({"url": "https://tokio.rs"}))).await;
        assert!(result.success);
        assert_eq!(result.output, ToolOutput::Text("Tokio docs".to_string()));
    }

    #[tokio::test]
    async fn test_truncation_appends_marker() {
        let page = FixedPage::new(&"a".repeat(50));
        let adapter = ScrapeAdapter::new(page.clone(), 10);

        let result = adapter
            .invoke(&args(json!({"url": "https://example.com", "max_chars": 1000})))
            .await;
        let text = result.output.render();
        assert!(text.starts_with("aaaaaaaaaa\n"));
        assert!(text.ends_with("[... content truncated at 10 characters]"));

        let (_, options) = page.seen.lock().unwrap().clone().unwrap();
        assert_eq!(options.max_chars, Some(10));
    }

    #[tokio::test]
    async fn test_requested_limit_with_zero_cap_does_not_panic() {
        let page = FixedPage::new("abc");
        let adapter = ScrapeAdapter::new(page.clone(), 0);

        let result = adapter
            .invoke(&args(json!({"url": "https://example.com", "max_chars": 5})))
            .await;
        assert!(result.success);

        let (_, options) = page.seen.lock().unwrap().clone().unwrap();
        assert_eq!(options.max_chars, Some(1));
    }

    #[tokio::test]
    async fn test_non_http_scheme_is_rejected() {
        let page = FixedPage::new("secret");
        let adapter = ScrapeAdapter::new(page.clone(), 100);

        let result = adapter.invoke(&args(json!({"url": "file:///etc/passwd"}))).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("only http and https"));
        assert!(page.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let adapter = ScrapeAdapter::new(FixedPage::new(""), 100);
        let result = adapter.invoke(&args(json!({"url": "not a url"}))).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid url"));
    }

    #[tokio::test]
    async fn test_raw_option_is_forwarded() {
        let page = FixedPage::new("<p>hi</p>");
        let adapter = ScrapeAdapter::new(page.clone(), 100);
        adapter
            .invoke(&args(json!({"url": "http://example.com", "raw": true})))
            .await;

        let (url, options) = page.seen.lock().unwrap().clone().unwrap();
        assert_eq!(url, "http://example.com/");
        assert!(options.raw);
    }
}
