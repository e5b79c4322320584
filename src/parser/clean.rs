//! Structural cleaning of raw payload text before any JSON parsing: strip
//! leading garbage and control characters, unescape doubly-stringified
//! documents, split concatenated top-level objects, and unwrap pre-processed
//! wrapper envelopes.

use crate::error::{HydrateError, HydrateResult};

/// Leading bytes tolerated before the first `{` or `[`.
const MAX_LEADING_GARBAGE: usize = 100;

pub fn clean_payload(raw: &str) -> HydrateResult<Vec<serde_json::Value>> {
    let stripped = strip_control_chars(raw);
    // unescape before garbage stripping: a doubly-stringified document opens
    // with a quote the garbage scan would otherwise eat
    let unescaped = unescape_if_double_stringified(&stripped);
    let body = strip_leading_garbage(&unescaped)?;

    let mut values = Vec::new();
    for chunk in split_concatenated(body) {
        match serde_json::from_str::<serde_json::Value>(chunk) {
            Ok(value) => values.push(unwrap_preprocessed(value)),
            Err(err) => {
                let sample: String = chunk.chars().take(60).collect();
                tracing::debug!(%err, sample, "unparseable payload chunk");
            }
        }
    }
    if values.is_empty() {
        return Err(HydrateError::Corrupt(format!(
            "no parseable JSON in payload ({} bytes)",
            raw.len()
        )));
    }
    Ok(values)
}

/// Remove NUL and control characters except tab/newline/carriage return.
fn strip_control_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn strip_leading_garbage(text: &str) -> HydrateResult<&str> {
    match text.find(['{', '[']) {
        Some(offset) if offset <= MAX_LEADING_GARBAGE => Ok(&text[offset..]),
        Some(offset) => Err(HydrateError::Corrupt(format!(
            "{offset} bytes of leading garbage"
        ))),
        None => Err(HydrateError::Corrupt("no JSON opener found".into())),
    }
}

/// A payload that was serialized twice arrives as one big JSON string;
/// unescape exactly one layer.
fn unescape_if_double_stringified(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(trimmed) {
            let inner_trimmed = inner.trim_start();
            if inner_trimmed.starts_with('{') || inner_trimmed.starts_with('[') {
                return inner;
            }
        }
    }
    text.to_string()
}

/// Split `}{`-concatenated top-level documents with a brace-balance walk that
/// is aware of strings and escapes.
fn split_concatenated(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut chunks = Vec::new();
    let mut depth = 0i32;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *b == b'\\' {
                escaped = true;
            } else if *b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        chunks.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(text);
    }
    chunks
}

/// Some historical cache rows wrap the real document: an envelope whose
/// `title` equals its `id`, with the payload under `rawJsonResponse`.
fn unwrap_preprocessed(value: serde_json::Value) -> serde_json::Value {
    let is_wrapper = value.get("rawJsonResponse").is_some()
        && match (value.get("id"), value.pointer("/volumeInfo/title").or(value.get("title"))) {
            (Some(id), Some(title)) => id == title,
            _ => true,
        };
    if !is_wrapper {
        return value;
    }
    match value.get("rawJsonResponse") {
        Some(serde_json::Value::String(inner)) => {
            serde_json::from_str(inner).unwrap_or(value)
        }
        Some(inner @ serde_json::Value::Object(_)) => inner.clone(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_short_leading_garbage() {
        let values = clean_payload("\u{feff}garbage{\"id\":\"a\"}").unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["id"], "a");
    }

    #[test]
    fn rejects_long_leading_garbage() {
        let raw = format!("{}{}", "x".repeat(200), r#"{"id":"a"}"#);
        assert!(matches!(
            clean_payload(&raw),
            Err(HydrateError::Corrupt(_))
        ));
    }

    #[test]
    fn strips_embedded_nulls_and_control_chars() {
        let raw = "{\"id\":\"a\u{0}\",\u{1} \"title\":\"T\"}";
        let values = clean_payload(raw).unwrap();
        assert_eq!(values[0]["id"], "a");
        assert_eq!(values[0]["title"], "T");
    }

    #[test]
    fn splits_concatenated_objects() {
        let values = clean_payload(r#"{"id":"a"}{"id":"b"}{"id":"c"}"#).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2]["id"], "c");
    }

    #[test]
    fn brace_walk_ignores_braces_inside_strings() {
        let values = clean_payload(r#"{"note":"open { and close }"}{"id":"b"}"#).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["note"], "open { and close }");
    }

    #[test]
    fn unescapes_double_stringified_json() {
        let inner = r#"{"id":"a","title":"T"}"#;
        let doubled = serde_json::to_string(inner).unwrap();
        let values = clean_payload(&doubled).unwrap();
        assert_eq!(values[0]["id"], "a");
    }

    #[test]
    fn unwraps_preprocessed_envelope() {
        let raw = serde_json::json!({
            "id": "vol1",
            "title": "vol1",
            "rawJsonResponse": r#"{"id":"vol1","volumeInfo":{"title":"Real Title"}}"#,
        })
        .to_string();
        let values = clean_payload(&raw).unwrap();
        assert_eq!(
            values[0].pointer("/volumeInfo/title"),
            Some(&serde_json::json!("Real Title"))
        );
    }
}
