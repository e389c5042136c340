//! Helpers for reading provider response bodies

use serde_json::Value;

/// Message used when a failing response carries no `error_message` at all
pub const UNEXPECTED_RESPONSE: &str = "The email marketing provider returned an unexpected response.";

/// Non-empty string (or number) field of a JSON object
pub fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn error_message(value: &Value) -> Option<String> {
    non_empty_str(value, "error_message")
}

/// Collect every `error_message` of a failing response.
///
/// A flat error object yields its own message. Otherwise each member of the
/// response (object values in document order, or array elements) contributes
/// its `error_message`, looking one level into arrays of error objects.
pub fn collect_error_messages(response: &Value) -> Vec<String> {
    if let Some(message) = error_message(response) {
        return vec![message];
    }

    let members: Vec<&Value> = match response {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let mut messages = Vec::new();
    for member in members {
        if let Some(message) = error_message(member) {
            messages.push(message);
        } else if let Value::Array(items) = member {
            messages.extend(items.iter().filter_map(error_message));
        }
    }

    messages
}

/// Join messages into one sentence list: `"X. Y."`
pub fn join_error_messages(messages: &[String]) -> String {
    if messages.is_empty() {
        return UNEXPECTED_RESPONSE.to_string();
    }

    let parts: Vec<&str> = messages
        .iter()
        .map(|m| m.trim().trim_end_matches('.'))
        .collect();

    format!("{}.", parts.join(". "))
}

/// Aggregated, human readable error text of a failing response
pub fn aggregate_errors(response: &Value) -> String {
    join_error_messages(&collect_error_messages(response))
}
