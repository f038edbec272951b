//! Small text helpers shared by the tools and the CLI.

/// Cut `s` to at most `max_chars` characters. Returns whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (s[..byte_idx].to_string(), true),
        None => (s.to_string(), false),
    }
}

/// Cut `s` to `max_chars` characters and append a marker telling the reader
/// that data was dropped.
pub fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    let (mut kept, cut) = truncate_chars(s, max_chars);
    if cut {
        kept.push_str(&truncation_marker(max_chars));
    }
    kept
}

pub fn truncation_marker(max_chars: usize) -> String {
    format!("\n[... content truncated at {} characters]", max_chars)
}

/// Single-line preview with an ellipsis.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    let (kept, cut) = truncate_chars(&flat, max_chars);
    if cut {
        format!("{}...", kept)
    } else {
        kept
    }
}
