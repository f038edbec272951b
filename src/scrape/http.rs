//! reqwest-based page fetcher.

use super::{
    is_textual_content_type, looks_binary, ExtractedPage, HtmlExtractor, PageFetcher,
    ScrapeOptions,
};
use crate::error::{PonderError, Result};
use crate::text::truncate_chars;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Hard ceiling on downloaded bytes, whatever the character limit.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Markup usually outweighs its text, so HTML gets at least this much.
const MIN_HTML_BODY_BYTES: usize = 1024 * 1024;

/// How many bytes to download for a page that will be cut at `max_chars`.
fn body_limit(max_chars: Option<usize>, extracts_html: bool) -> usize {
    match max_chars {
        // A char is at most four bytes of UTF-8.
        Some(max) if extracts_html => max.saturating_mul(4).max(MIN_HTML_BODY_BYTES),
        Some(max) => max.saturating_mul(4),
        None => MAX_BODY_BYTES,
    }
    .min(MAX_BODY_BYTES)
}

/// Append `chunk` to `buf` without growing past `limit`. Returns whether any
/// bytes had to be dropped.
fn push_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    chunk.len() > room
}

/// Drop a multi-byte character split by the byte cap.
fn trim_partial_char(buf: &mut Vec<u8>) {
    if let Err(e) = std::str::from_utf8(buf) {
        if e.error_len().is_none() {
            buf.truncate(e.valid_up_to());
        }
    }
}

/// Fetches pages over HTTP(S) and extracts their readable text.
pub struct HttpFetcher {
    http: reqwest::Client,
    extractor: HtmlExtractor,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            extractor: HtmlExtractor::new()?,
        })
    }

    fn to_text(&self, body: &str, content_type: &str, options: &ScrapeOptions) -> String {
        let is_html = content_type.contains("html") || body.trim_start().starts_with('<');
        if is_html && !options.raw {
            self.extractor.extract(body)
        } else {
            body.to_string()
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self, options), fields(url = %url))]
    async fn fetch_and_extract(&self, url: &str, options: &ScrapeOptions) -> Result<ExtractedPage> {
        info!("Fetching {}", url);

        let mut response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PonderError::ToolExecution(format!("HTTP error: {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ct) = &content_type {
            if !is_textual_content_type(ct) {
                return Err(PonderError::ToolExecution(format!(
                    "refusing non-text content type '{}'",
                    ct
                )));
            }
        }

        let extracts_html = !options.raw
            && content_type
                .as_deref()
                .map_or(true, |ct| ct.contains("html"));
        let limit = body_limit(options.max_chars, extracts_html);

        let mut bytes = Vec::new();
        let mut cut = false;
        while let Some(chunk) = response.chunk().await? {
            if push_capped(&mut bytes, &chunk, limit) {
                cut = true;
                break;
            }
        }
        if cut {
            debug!("Stopped reading after {} bytes", bytes.len());
            trim_partial_char(&mut bytes);
        }

        if content_type.is_none() && looks_binary(&bytes) {
            return Err(PonderError::ToolExecution(
                "response body looks binary".to_string(),
            ));
        }

        let body = String::from_utf8_lossy(&bytes);
        let text = self.to_text(&body, content_type.as_deref().unwrap_or_default(), options);

        let (text, truncated) = match options.max_chars {
            Some(max) => truncate_chars(&text, max),
            None => (text, false),
        };
        let truncated = truncated || cut;
        debug!("Extracted {} characters (truncated: {})", text.len(), truncated);

        Ok(ExtractedPage {
            text,
            truncated,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new("test-agent", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_html_is_extracted_unless_raw() {
        let fetcher = fetcher();
        let html = "<html><body><p>Hello</p><p>World</p></body></html>";

        let text = fetcher.to_text(html, "text/html", &ScrapeOptions::default());
        assert_eq!(text, "Hello\nWorld");

        let raw = ScrapeOptions {
            raw: true,
            ..Default::default()
        };
        assert_eq!(fetcher.to_text(html, "text/html", &raw), html);
    }

    #[test]
    fn test_body_limit() {
        assert_eq!(body_limit(Some(100), false), 400);
        assert_eq!(body_limit(Some(100), true), MIN_HTML_BODY_BYTES);
        assert_eq!(body_limit(Some(usize::MAX), false), MAX_BODY_BYTES);
        assert_eq!(body_limit(None, true), MAX_BODY_BYTES);
    }

    #[test]
    fn test_push_capped_stops_at_limit() {
        let mut buf = Vec::new();
        assert!(!push_capped(&mut buf, b"abc", 8));
        assert!(!push_capped(&mut buf, b"de", 8));
        assert!(push_capped(&mut buf, b"fghij", 8));
        assert_eq!(buf, b"abcdefgh");

        // Nothing more is taken once full.
        assert!(push_capped(&mut buf, b"k", 8));
        assert_eq!(buf.len(), 8);

        let mut exact = Vec::new();
        assert!(!push_capped(&mut exact, b"abcd", 4));
        assert!(push_capped(&mut exact, b"e", 4));
    }

    #[test]
    fn test_trim_partial_char() {
        let mut buf = "hé".as_bytes()[..2].to_vec();
        trim_partial_char(&mut buf);
        assert_eq!(buf, b"h");

        let mut whole = "hé".as_bytes().to_vec();
        trim_partial_char(&mut whole);
        assert_eq!(whole, "hé".as_bytes());
    }

    #[test]
    fn test_plain_text_passes_through() {
        let text = fetcher().to_text("a  b\n\nc", "text/plain", &ScrapeOptions::default());
        assert_eq!(text, "a  b\n\nc");
    }
}
