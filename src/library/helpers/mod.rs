//! Various small helper functions
//!
//! Stateless functions which are used by more than one part of the crate.

mod timeout;

pub use timeout::*;

use serde_json::{Map, Value};
use std::num::ParseIntError;
use std::time::Duration;

/// Splits the input string into two parts at the first occurence of the separator
pub fn split_into_two(input: &str, separator: &'static str) -> Option<(String, String)> {
    let parts: Vec<&str> = input.splitn(2, separator).collect();

    if parts.len() != 2 {
        return None;
    }

    Some((parts[0].to_string(), parts[1].to_string()))
}

/// Parses a Duration from a string containing seconds.
/// Useful for command line parsing
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    let seconds = src.parse::<u64>()?;
    Ok(Duration::from_secs(seconds))
}

/// Whether a content type announces a JSON body (case-insensitive substring match)
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|t| t.to_ascii_lowercase().contains("json"))
        .unwrap_or(false)
}

/// Parses a message body into a flat map
///
/// JSON bodies (as announced by the content type) are parsed as an object. Anything that is not
/// a JSON object, including invalid JSON, yields an empty map instead of an error.
///
/// All other bodies are treated as newline separated `key:value` lines. The first colon splits
/// the key from the value and both are trimmed. Lines without a colon map their key to `null`,
/// while a colon followed by nothing yields an empty string. Lines without a key are skipped.
pub fn body_to_map(content_type: Option<&str>, body: &str) -> Map<String, Value> {
    if is_json_content_type(content_type) {
        return match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
    }

    let mut map = Map::new();

    for line in body.split('\n') {
        let (key, value) = match split_into_two(line, ":") {
            Some((key, value)) => (key, Value::String(value.trim().to_string())),
            None => (line.to_string(), Value::Null),
        };

        let key = key.trim();
        if !key.is_empty() {
            map.insert(key.to_string(), value);
        }
    }

    map
}
