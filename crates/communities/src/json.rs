//! Pulls a JSON value out of free-form model output.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*\n(.*?)\n```").expect("valid regex"));

/// Tries, in order: the whole text with a ```json fence stripped, the first
/// fenced json block, the first balanced `{...}` span, the first balanced
/// `[...]` span. `None` when nothing parses.
pub fn extract_json(text: &str) -> Option<Value> {
    let stripped = text.trim();
    let stripped = stripped.strip_prefix("```json").unwrap_or(stripped);
    let stripped = stripped.strip_suffix("```").unwrap_or(stripped);
    if let Ok(value) = serde_json::from_str(stripped.trim()) {
        return Some(value);
    }

    if let Some(captures) = FENCED_JSON.captures(text) {
        if let Ok(value) = serde_json::from_str(captures[1].trim()) {
            return Some(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = balanced_span(text, open, close) {
            if let Ok(value) = serde_json::from_str(span) {
                return Some(value);
            }
        }
    }

    None
}

/// First span from `open` to its matching `close`, skipping delimiters that
/// sit inside string literals.
fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
