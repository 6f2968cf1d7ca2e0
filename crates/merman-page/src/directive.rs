//! Inline `%%{init: ...}%%` directive detection.
//!
//! The bootstrapper only reports these (an early re-initialization request embedded in a
//! diagram); applying them is the engine's job.

use crate::MermaidConfig;
use serde_json::{Map, Value};

/// String values containing any of these are blanked.
const UNSAFE_MARKERS: &[&str] = &["<", ">", "url(data:"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid directive JSON: {message}")]
pub struct DirectiveError {
    pub message: String,
}

/// Merges the arguments of every `init` / `initialize` directive in `text`.
///
/// Returns `Ok(None)` when the text carries no such directive. Single-quoted JSON is accepted.
/// Keys named `secure` or starting with `__` are dropped, and string values that could smuggle
/// markup (`<`, `>`, `url(data:`) are blanked.
pub fn detect_init(text: &str) -> Result<Option<MermaidConfig>, DirectiveError> {
    let text = text.replace('\'', "\"");
    let mut merged: Option<MermaidConfig> = None;
    for body in directive_bodies(&text) {
        let Some(raw) = init_arguments(body) else {
            continue;
        };
        let mut args = parse_arguments(raw)?;
        strip_unsafe(&mut args);
        merged
            .get_or_insert_with(MermaidConfig::empty_object)
            .deep_merge(&args);
    }
    Ok(merged)
}

/// The text between each `%%{` and the `}%%` that closes it.
fn directive_bodies(text: &str) -> impl Iterator<Item = &str> {
    text.split("%%{")
        .skip(1)
        .filter_map(|chunk| chunk.find("}%%").map(|end| &chunk[..end]))
}

/// The argument text of an `init` / `initialize` directive; `None` for any other directive.
fn init_arguments(body: &str) -> Option<&str> {
    let body = body.trim();
    let name_end = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    if !matches!(&body[..name_end], "init" | "initialize") {
        return None;
    }
    let rest = body[name_end..].trim_start();
    Some(rest.strip_prefix(':').unwrap_or_default().trim())
}

fn parse_arguments(raw: &str) -> Result<Value, DirectiveError> {
    if raw.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(args @ Value::Object(_)) => Ok(args),
        Ok(_) => Err(DirectiveError {
            message: "init arguments must be a JSON object".to_string(),
        }),
        Err(e) => Err(DirectiveError {
            message: e.to_string(),
        }),
    }
}

fn strip_unsafe(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| key != "secure" && !key.starts_with("__"));
            map.values_mut().for_each(strip_unsafe);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_unsafe),
        Value::String(s) if UNSAFE_MARKERS.iter().any(|m| s.contains(m)) => s.clear(),
        _ => {}
    }
}
