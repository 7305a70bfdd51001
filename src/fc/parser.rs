use serde_json::Value;

use super::prompt::{PARAMETERS_KEY, TOOL_NAME_KEY};
use crate::json_scan::embedded_object_spans;

/// A tool invocation recovered from free text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToolInvocation {
    pub tool_name: String,
    /// Always a JSON object.
    pub parameters: Value,
}

/// Find a `{"tool_name": ..., "parameters": {...}}` object in model text.
///
/// The whole trimmed text is tried first. Otherwise each complete JSON
/// object embedded in the text is tried in order and the first one that
/// names a tool wins. A best-effort heuristic: a `tool_name` quoted inside
/// prose, or several candidate objects, are not disambiguated further.
#[must_use]
pub fn parse_text_tool_call(text: &str) -> Option<TextToolInvocation> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(invocation) = invocation_from_json(trimmed) {
        return Some(invocation);
    }
    embedded_object_spans(trimmed)
        .into_iter()
        .find_map(|span| invocation_from_json(&trimmed[span]))
}

fn invocation_from_json(candidate: &str) -> Option<TextToolInvocation> {
    let Value::Object(mut object) = serde_json::from_str::<Value>(candidate).ok()? else {
        return None;
    };
    let tool_name = match object.remove(TOOL_NAME_KEY)? {
        Value::String(name) if !name.trim().is_empty() => name,
        _ => return None,
    };
    let parameters = match object.remove(PARAMETERS_KEY) {
        Some(params @ Value::Object(_)) => params,
        _ => Value::Object(serde_json::Map::new()),
    };
    Some(TextToolInvocation {
        tool_name,
        parameters,
    })
}
