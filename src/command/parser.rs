//! Tag grammar for model replies.
//!
//! ```text
//! tag       := "<" name attribute* ">" body "</" name ">"
//! name      := [A-Za-z_][A-Za-z0-9_.-]*
//! attribute := name "=" quoted-string
//! body      := JSON object | plain text
//! ```
//!
//! A tag is treated as a command when its name is a known tool, or when it is
//! closed and its whole body is a JSON object. Every other `<...>` is ordinary
//! text, so markdown such as `<br>`, `Vec<T>` or JSX like `<ul>{items}</ul>`
//! passes through untouched. Unknown tags inside code spans are always text.

use super::{Annotations, Arguments, ParseError, ParsedReply, ReplyKind, ToolCommand, ToolKind};
use std::collections::BTreeMap;

/// Tag that wraps a terminal answer.
pub const FINAL_ANSWER_TAG: &str = "final_answer";

/// Tag that wraps model reasoning. Stripped from the residual text.
pub const THINK_TAG: &str = "think";

/// Prefixes that mark text as an error echo rather than an answer.
const ERROR_MARKERS: [&str; 2] = ["Error:", "ERROR:"];

/// An opening tag found by the lexer.
struct OpenTag<'a> {
    name: &'a str,
    attributes: BTreeMap<String, String>,
    /// Byte offset of the `<`.
    start: usize,
    /// Byte offset just past the `>`.
    body_start: usize,
}

/// Parse a model reply into at most one command, an answer, or neither.
///
/// Pure: the same input always yields the same output.
pub fn parse_reply(text: &str) -> Result<ParsedReply, ParseError> {
    let mut removed: Vec<(usize, usize)> = Vec::new();
    let mut commands: Vec<Result<(ToolCommand, Annotations), ParseError>> = Vec::new();
    let mut answer: Option<Result<(String, Annotations), ParseError>> = None;
    let mut imitates_feedback = false;
    let code = code_spans(text);

    let mut pos = 0;
    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        let Some(tag) = lex_open_tag(text, start) else {
            pos = start + 1;
            continue;
        };

        let closing = format!("</{}>", tag.name);
        let close_at = text[tag.body_start..]
            .find(&closing)
            .map(|i| tag.body_start + i);
        let end = close_at.map(|c| c + closing.len());
        let name = tag.name.to_ascii_lowercase();

        if name == THINK_TAG {
            match end {
                Some(end) => {
                    removed.push((start, end));
                    pos = end;
                }
                None => pos = tag.body_start,
            }
            continue;
        }

        if name == FINAL_ANSWER_TAG {
            match (close_at, end) {
                (Some(close_at), Some(end)) => {
                    if answer.is_none() {
                        let body = text[tag.body_start..close_at].to_string();
                        answer = Some(Ok((body, annotations_from(tag.attributes))));
                    }
                    removed.push((start, end));
                    pos = end;
                }
                _ => {
                    if answer.is_none() {
                        answer = Some(Err(ParseError::MissingClosingTag {
                            tag: tag.name.to_string(),
                        }));
                    }
                    removed.push((start, tag.body_start));
                    pos = tag.body_start;
                }
            }
            continue;
        }

        if is_feedback_marker(&name) {
            imitates_feedback = true;
            pos = end.unwrap_or(tag.body_start);
            continue;
        }

        let kind = ToolKind::from_tag(&name);
        if kind.is_none() {
            let in_code = code.iter().any(|&(s, e)| s <= start && start < e);
            let json_body =
                !in_code && close_at.is_some_and(|c| is_json_object(&text[tag.body_start..c]));
            if !json_body {
                pos = tag.body_start;
                continue;
            }
        }

        let span_end = end.unwrap_or(tag.body_start);
        removed.push((start, span_end));
        pos = span_end;

        let candidate = match (kind, close_at) {
            (None, _) => Err(ParseError::UnknownTool {
                tag: tag.name.to_string(),
            }),
            (Some(_), None) => Err(ParseError::MissingClosingTag {
                tag: tag.name.to_string(),
            }),
            (Some(kind), Some(close_at)) => build_command(
                kind,
                tag.name,
                &text[tag.body_start..close_at],
                tag.attributes,
            ),
        };
        commands.push(candidate);
    }

    let residual = residual_text(text, &removed);

    // Tool commands are authoritative: the first well-formed one wins over any
    // answer in the same reply, and a reply whose only commands are malformed
    // is an error even if it also carries an answer.
    let mut first_error = None;
    for candidate in commands {
        match candidate {
            Ok((command, annotations)) => {
                return Ok(ParsedReply {
                    kind: ReplyKind::Command(command),
                    residual,
                    annotations,
                });
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    match answer {
        Some(Ok((body, annotations))) => {
            let body = body.trim();
            if body.is_empty() {
                return Err(ParseError::EmptyFinalAnswer);
            }
            Ok(ParsedReply {
                kind: ReplyKind::Answer(body.to_string()),
                residual,
                annotations,
            })
        }
        Some(Err(e)) => Err(e),
        None => {
            let kind = if imitates_feedback || residual.is_empty() || is_error_echo(&residual) {
                ReplyKind::Unclassified
            } else {
                ReplyKind::Answer(residual.clone())
            };
            Ok(ParsedReply {
                kind,
                residual,
                annotations: Annotations::default(),
            })
        }
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Lex `<name attr="value" ...>` starting at `start`.
fn lex_open_tag(text: &str, start: usize) -> Option<OpenTag<'_>> {
    let bytes = text.as_bytes();
    let name_start = start + 1;
    if !bytes.get(name_start).copied().is_some_and(is_name_start) {
        return None;
    }
    let mut i = name_start + 1;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = &text[name_start..i];

    let mut attributes = BTreeMap::new();
    loop {
        let next = skip_whitespace(bytes, i);
        match *bytes.get(next)? {
            b'>' => {
                return Some(OpenTag {
                    name,
                    attributes,
                    start,
                    body_start: next + 1,
                });
            }
            // Attributes must be separated from what precedes them.
            _ if next == i => return None,
            _ => {
                let (key, value, after) = lex_attribute(text, next)?;
                attributes.insert(key, value);
                i = after;
            }
        }
    }
}

/// Lex `key="value"` (or single-quoted) starting at `start`.
fn lex_attribute(text: &str, start: usize) -> Option<(String, String, usize)> {
    let bytes = text.as_bytes();
    if !is_name_start(*bytes.get(start)?) {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-'))
    {
        i += 1;
    }
    let key = text[start..i].to_ascii_lowercase();

    i = skip_whitespace(bytes, i);
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i = skip_whitespace(bytes, i + 1);

    let quote = *bytes.get(i)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value_start = i + 1;
    let value_len = text[value_start..].find(quote as char)?;
    let value = text[value_start..value_start + value_len].to_string();
    Some((key, value, value_start + value_len + 1))
}

fn is_json_object(body: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(body.trim()),
        Ok(serde_json::Value::Object(_))
    )
}

/// Byte ranges covered by backtick code spans and fenced blocks.
///
/// A run of N backticks opens a span closed by the next run of the same
/// length. An unmatched run is plain text.
fn code_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('`') {
        let start = pos + offset;
        let run = text[start..].bytes().take_while(|&b| b == b'`').count();
        let fence = &text[start..start + run];
        let body = start + run;
        match text[body..].find(fence) {
            Some(i) => {
                let end = body + i + run;
                spans.push((start, end));
                pos = end;
            }
            None => pos = body,
        }
    }
    spans
}

fn is_feedback_marker(name: &str) -> bool {
    name == "error" || name.ends_with(".result") || name.ends_with(".error")
}

fn is_error_echo(text: &str) -> bool {
    ERROR_MARKERS.iter().any(|m| text.starts_with(m))
}

fn annotations_from(attributes: BTreeMap<String, String>) -> Annotations {
    let mut annotations = Annotations::default();
    for (key, value) in attributes {
        if key == "confidence" {
            annotations.confidence = Some(value);
        } else {
            annotations.metadata.insert(key, value);
        }
    }
    annotations
}

/// Text outside the removed spans, trimmed.
fn residual_text(text: &str, removed: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in removed {
        if start > cursor {
            out.push_str(&text[cursor..start]);
        }
        cursor = cursor.max(end);
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }
    out.trim().to_string()
}

/// Turn a tag body into a validated command.
fn build_command(
    kind: ToolKind,
    tag: &str,
    body: &str,
    attributes: BTreeMap<String, String>,
) -> Result<(ToolCommand, Annotations), ParseError> {
    let mut annotations = annotations_from(attributes);
    let trimmed = body.trim();

    let mut arguments = if trimmed.starts_with('{') {
        let value: serde_json::Value =
            serde_json::from_str(trimmed).map_err(|e| ParseError::InvalidArguments {
                tag: tag.to_string(),
                reason: e.to_string(),
            })?;
        match value {
            serde_json::Value::Object(map) => map.into_iter().collect::<Arguments>(),
            _ => {
                return Err(ParseError::InvalidArguments {
                    tag: tag.to_string(),
                    reason: "expected a JSON object".to_string(),
                })
            }
        }
    } else {
        let mut arguments = Arguments::new();
        let value = match kind {
            ToolKind::ExecuteCode => strip_code_fence(body),
            _ => trimmed.to_string(),
        };
        if !value.trim().is_empty() {
            arguments.insert(
                kind.primary_argument().to_string(),
                serde_json::Value::String(value),
            );
        }
        arguments
    };

    for (alias, canonical) in kind.argument_aliases() {
        if !arguments.contains_key(*canonical) {
            if let Some(value) = arguments.remove(*alias) {
                arguments.insert(canonical.to_string(), value);
            }
        }
    }

    if let Some(confidence) = arguments.remove("confidence") {
        if annotations.confidence.is_none() {
            annotations.confidence = Some(match confidence {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
        }
    }

    let primary = kind.primary_argument();
    match arguments.get(primary) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {}
        Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
            return Err(ParseError::MissingArgument {
                tag: tag.to_string(),
                argument: primary.to_string(),
            })
        }
        Some(other) => {
            return Err(ParseError::InvalidArguments {
                tag: tag.to_string(),
                reason: format!("'{}' must be a string, got {}", primary, other),
            })
        }
    }

    Ok((ToolCommand::new(kind, arguments), annotations))
}

/// Remove a surrounding markdown code fence, keeping indentation intact.
fn strip_code_fence(body: &str) -> String {
    let trimmed = body.trim_matches(|c| c == '\n' || c == '\r');
    let inner = trimmed.trim();
    if let Some(rest) = inner.strip_prefix("```") {
        if let Some(without_close) = rest.strip_suffix("```") {
            // Drop the info string (e.g. "python") on the opening line.
            let code = match without_close.find('\n') {
                Some(newline) => &without_close[newline + 1..],
                None => without_close,
            };
            return code.trim_end().to_string();
        }
    }
    trimmed.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> ToolCommand {
        parse_reply(text)
            .unwrap()
            .command()
            .cloned()
            .expect("expected a command")
    }

    #[test]
    fn test_plain_answer() {
        let parsed = parse_reply("  The capital of France is **Paris**.\n").unwrap();
        assert_eq!(
            parsed.kind,
            ReplyKind::Answer("The capital of France is **Paris**.".to_string())
        );
        assert!(parsed.annotations.is_empty());
    }

    #[test]
    fn test_search_json_body() {
        let cmd = command(r#"Let me look. <search>{"query": "rust 2024 edition", "topic": "news"}</search>"#);
        assert_eq!(cmd.tool_kind, ToolKind::Search);
        assert_eq!(cmd.arguments["query"], "rust 2024 edition");
        assert_eq!(cmd.arguments["topic"], "news");
    }

    #[test]
    fn test_residual_excludes_tags() {
        let parsed = parse_reply(
            "<think>I need data.</think>Checking the web.\n<search>{\"query\": \"x\"}</search>",
        )
        .unwrap();
        assert_eq!(parsed.residual, "Checking the web.");
    }

    #[test]
    fn test_legacy_tags_and_argument_aliases() {
        let cmd = command(r#"<internet_search>{"keywords": "tokio", "timelimit": "w"}</internet_search>"#);
        assert_eq!(cmd.tool_kind, ToolKind::Search);
        assert_eq!(cmd.arguments["query"], "tokio");
        assert_eq!(cmd.arguments["time_range"], "w");
        assert!(!cmd.arguments.contains_key("keywords"));

        let cmd = command(r#"<code_executer>{"code": "print(1)"}</code_executer>"#);
        assert_eq!(cmd.tool_kind, ToolKind::ExecuteCode);
    }

    #[test]
    fn test_plain_body_binds_primary_argument() {
        let cmd = command("<scrape>https://example.com/page</scrape>");
        assert_eq!(cmd.arguments["url"], "https://example.com/page");
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let cmd = command("<execute_code>\n```python\nfor i in range(2):\n    print(i)\n```\n</execute_code>");
        assert_eq!(cmd.arguments["code"], "for i in range(2):\n    print(i)");
    }

    #[test]
    fn test_final_answer_with_confidence() {
        let parsed =
            parse_reply(r#"<final_answer confidence="high" source="web">**42**</final_answer>"#)
                .unwrap();
        assert_eq!(parsed.kind, ReplyKind::Answer("**42**".to_string()));
        assert_eq!(parsed.annotations.confidence.as_deref(), Some("high"));
        assert_eq!(parsed.annotations.metadata["source"], "web");
    }

    #[test]
    fn test_confidence_in_json_body_is_an_annotation() {
        let parsed = parse_reply(r#"<search>{"query": "q", "confidence": 0.4}</search>"#).unwrap();
        assert_eq!(parsed.annotations.confidence.as_deref(), Some("0.4"));
        assert!(!parsed.command().unwrap().arguments.contains_key("confidence"));
    }

    #[test]
    fn test_command_wins_over_answer() {
        let parsed = parse_reply(
            "<final_answer>Probably 3.</final_answer><execute_code>{\"code\": \"print(1+2)\"}</execute_code>",
        )
        .unwrap();
        assert_eq!(parsed.command().unwrap().tool_kind, ToolKind::ExecuteCode);
    }

    #[test]
    fn test_only_first_command_is_honored() {
        let cmd = command(
            r#"<search>{"query": "first"}</search> <scrape>{"url": "https://example.com"}</scrape>"#,
        );
        assert_eq!(cmd.tool_kind, ToolKind::Search);
        assert_eq!(cmd.arguments["query"], "first");
    }

    #[test]
    fn test_malformed_then_wellformed_takes_wellformed() {
        let cmd = command(r#"<search>{}</search> <search>{"query": "second"}</search>"#);
        assert_eq!(cmd.arguments["query"], "second");
    }

    #[test]
    fn test_missing_closing_tag() {
        let err = parse_reply(r#"<search>{"query": "x"}"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingClosingTag {
                tag: "search".to_string()
            }
        );

        let err = parse_reply("<final_answer>almost done").unwrap_err();
        assert!(matches!(err, ParseError::MissingClosingTag { .. }));
    }

    #[test]
    fn test_unknown_tool() {
        let err = parse_reply(r#"<send_email>{"to": "a@b.c"}</send_email>"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownTool {
                tag: "send_email".to_string()
            }
        );
    }

    #[test]
    fn test_missing_required_argument() {
        let err = parse_reply(r#"<search>{"topic": "news"}</search>"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingArgument {
                tag: "search".to_string(),
                argument: "query".to_string()
            }
        );

        let err = parse_reply("<scrape>   </scrape>").unwrap_err();
        assert!(matches!(err, ParseError::MissingArgument { .. }));
    }

    #[test]
    fn test_invalid_json_arguments() {
        let err = parse_reply(r#"<search>{"query": }</search>"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidArguments { .. }));

        let err = parse_reply(r#"<search>{"query": 12}</search>"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidArguments { .. }));
    }

    #[test]
    fn test_malformed_command_beats_answer() {
        let err = parse_reply("<final_answer>done</final_answer><search>{}</search>").unwrap_err();
        assert!(matches!(err, ParseError::MissingArgument { .. }));
    }

    #[test]
    fn test_markdown_angle_brackets_are_text() {
        let parsed = parse_reply("Use `Vec<String>` and a line<br>break.").unwrap();
        assert_eq!(
            parsed.kind,
            ReplyKind::Answer("Use `Vec<String>` and a line<br>break.".to_string())
        );
    }

    #[test]
    fn test_jsx_and_generic_braces_are_answers() {
        for text in [
            "Render it with <ul>{items.map(i => <li>{i}</li>)}</ul> in the component.",
            "Define struct Wrapper<T>{ inner: T } and you are done.",
            "Wrap it: <Provider>{children}</Provider>",
        ] {
            let parsed = parse_reply(text).unwrap();
            assert_eq!(parsed.kind, ReplyKind::Answer(text.to_string()), "input: {:?}", text);
        }
    }

    #[test]
    fn test_unknown_tags_in_code_are_text() {
        let text = "Call it like this:\n```\n<send_email>{\"to\": \"a@b.c\"}</send_email>\n```\nor inline `<notify>{\"x\": 1}</notify>`.";
        let parsed = parse_reply(text).unwrap();
        assert_eq!(parsed.kind, ReplyKind::Answer(text.to_string()));
    }

    #[test]
    fn test_code_spans() {
        let text = "a `b` c ```\nd\n``` e `unclosed";
        let spans = code_spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].0..spans[0].1], "`b`");
        assert_eq!(&text[spans[1].0..spans[1].1], "```\nd\n```");
    }

    #[test]
    fn test_unclassifiable_replies() {
        for text in [
            "",
            "   \n",
            "<think>only reasoning</think>",
            "<search.result>[]</search.result>",
            "Error: I could not do it",
        ] {
            let parsed = parse_reply(text).unwrap();
            assert_eq!(parsed.kind, ReplyKind::Unclassified, "input: {:?}", text);
        }
    }

    #[test]
    fn test_empty_final_answer() {
        assert_eq!(
            parse_reply("<final_answer>  </final_answer>").unwrap_err(),
            ParseError::EmptyFinalAnswer
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let inputs = [
            r#"intro <search confidence="low">{"query": "a"}</search> outro"#,
            "<final_answer>x</final_answer>",
            "<search>{}</search>",
            "plain",
        ];
        for text in inputs {
            assert_eq!(parse_reply(text), parse_reply(text));
        }
    }

    #[test]
    fn test_non_ascii_text_around_tags() {
        let parsed = parse_reply("Résumé → <search>{\"query\": \"café\"}</search> ✓").unwrap();
        assert_eq!(parsed.command().unwrap().arguments["query"], "café");
        assert_eq!(parsed.residual, "Résumé →  ✓");
    }
}
