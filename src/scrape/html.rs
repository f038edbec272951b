//! HTML to readable text.

use crate::error::{PonderError, Result};
use regex::Regex;

/// Strips markup from HTML and keeps the readable text, one phrase per line.
pub struct HtmlExtractor {
    hidden_blocks: Vec<Regex>,
    block_breaks: Regex,
    tags: Regex,
}

impl HtmlExtractor {
    pub fn new() -> Result<Self> {
        let compile =
            |p: &str| Regex::new(p).map_err(|e| PonderError::Config(format!("Invalid regex: {}", e)));

        Ok(Self {
            hidden_blocks: vec![
                compile(r"(?s)<!--.*?-->")?,
                compile(r"(?is)<script\b.*?</script\s*>")?,
                compile(r"(?is)<style\b.*?</style\s*>")?,
                compile(r"(?is)<noscript\b.*?</noscript\s*>")?,
                compile(r"(?is)<head\b.*?</head\s*>")?,
            ],
            block_breaks: compile(
                r"(?i)</?(?:br|p|div|li|ul|ol|tr|table|section|article|header|footer|nav|h[1-6]|blockquote|pre)\b[^>]*>",
            )?,
            tags: compile(r"(?s)<[^>]*>")?,
        })
    }

    /// Extract readable text: hidden blocks dropped, tags removed, entities
    /// decoded, and blank lines collapsed.
    pub fn extract(&self, html: &str) -> String {
        let mut text = html.to_string();
        for pattern in &self.hidden_blocks {
            text = pattern.replace_all(&text, " ").into_owned();
        }
        let text = self.block_breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, " ");
        let text = decode_entities(&text);

        text.lines()
            .flat_map(|line| line.split("  "))
            .map(|phrase| phrase.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|phrase| !phrase.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decode the HTML entities that show up in ordinary page text.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let named = s
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}")
        .replace("&hellip;", "\u{2026}");

    let mut out = String::with_capacity(named.len());
    let mut rest = named.as_str();
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_one(tail) {
            Some((decoded, consumed)) => {
                out.push(decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode `&amp;` or a numeric reference at the start of `s`.
fn decode_one(s: &str) -> Option<(char, usize)> {
    if s.starts_with("&amp;") {
        return Some(('&', 5));
    }
    let body = s.strip_prefix("&#")?;
    let end = body.find(';')?;
    if end == 0 || end > 8 {
        return None;
    }
    let digits = &body[..end];
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    Some((char::from_u32(code)?, 2 + end + 1))
}
