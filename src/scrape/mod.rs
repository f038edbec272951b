//! Page fetching and readable-text extraction.

mod html;
mod http;

pub use html::{decode_entities, HtmlExtractor};
pub use http::HttpFetcher;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options for a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    /// Cut extracted text after this many characters.
    pub max_chars: Option<usize>,
    /// Return the body as-is instead of extracting text from HTML.
    pub raw: bool,
}

/// Text extracted from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub text: String,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Trait for page fetchers.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_and_extract(&self, url: &str, options: &ScrapeOptions) -> Result<ExtractedPage>;
}

/// Whether a content type carries text we can hand to a model.
pub fn is_textual_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || matches!(
            mime.as_str(),
            "application/json"
                | "application/xml"
                | "application/xhtml+xml"
                | "application/javascript"
                | "application/rss+xml"
                | "application/atom+xml"
        )
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
}

/// Heuristic for bodies served without a content type.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(1024).any(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_content_types() {
        assert!(is_textual_content_type("text/html; charset=utf-8"));
        assert!(is_textual_content_type("application/json"));
        assert!(is_textual_content_type("application/ld+json"));
        assert!(!is_textual_content_type("image/png"));
        assert!(!is_textual_content_type("application/pdf"));
        assert!(!is_textual_content_type("application/octet-stream"));
    }

    #[test]
    fn test_looks_binary() {
        assert!(looks_binary(&[0x89, b'P', b'N', b'G', 0x00, 0x01]));
        assert!(!looks_binary(b"<html>hello</html>"));
    }
}
