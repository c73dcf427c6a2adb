//! Helpers shared across models for the JSON text columns.

use serde_json::Value;

/// Parse a JSON array column into a list of strings
pub fn parse_string_list(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Parse an optional JSON blob column
pub fn parse_json(json: Option<&str>) -> Option<Value> {
    json.and_then(|s| serde_json::from_str(s).ok())
}

/// Serialize a list of strings for storage
pub fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Serialize an optional JSON blob for storage. JSON `null` is stored as SQL NULL.
pub fn encode_json(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.to_string()),
    }
}
