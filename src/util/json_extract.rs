//! Best-effort recovery of structured content from free-text model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").unwrap());

static SELECT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bselect\b").unwrap());

/// The span from the first `{` to the last `}`, if both exist in that order.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decodes the embedded JSON object; any failure means "no structured output".
pub fn parse_embedded_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let span = extract_json_object(text)?;
    match serde_json::from_str(span) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Embedded JSON did not decode: {}", e);
            None
        }
    }
}

pub fn strip_code_fences(text: &str) -> String {
    FENCE_REGEX.replace_all(text, "").into_owned()
}

/// From the first `SELECT` keyword through the next `;` inclusive (or to the end).
pub fn extract_select_statement(text: &str) -> Option<String> {
    let text = strip_code_fences(text);
    let mat = SELECT_REGEX.find(&text)?;
    let rest = &text[mat.start()..];
    let statement = match rest.find(';') {
        Some(end) => &rest[..=end],
        None => rest,
    };
    Some(statement.to_string())
}

/// Trims, drops trailing semicolons, then appends exactly one. Empty stays empty.
pub fn normalize_sql(sql: &str) -> String {
    let trimmed = sql
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{};", trimmed)
    }
}
