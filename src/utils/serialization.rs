// src/utils/serialization.rs
//! JSON helpers for self-describing QR payloads.
//!
//! QR payloads are loosely typed: fields may be missing or carry the wrong
//! JSON type. These helpers read them leniently with explicit defaults
//! instead of failing the whole scan.

use serde_json::{Map, Value};

/// Parses `data` as a JSON object.
///
/// # Returns
/// - `Some(map)` if `data` is valid JSON and its top level is an object
/// - `None` for malformed JSON, arrays, strings, numbers, etc.
pub fn parse_object(data: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Reads a string field, falling back to `default` when the field is absent
/// or not a JSON string.
pub fn string_field(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Reads an epoch-milliseconds field.
///
/// Accepts integers, floats (as produced by some JS encoders, truncated) and
/// numeric strings in either form. Anything else, including a missing field, reads as `0`.
pub fn millis_field(obj: &Map<String, Value>, key: &str) -> i64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}
