use super::{MessageContent, Target};
use crate::constants::CACHE_KEY_PREFIX;
use serde_json::json;

/// Cache key shared by all requests with the same target and content
pub fn fingerprint(target: &Target, content: &MessageContent) -> String {
    let key = json!({
        "target": target.name(),
        "verb": content.verb,
        "parameters": content.parameters,
        "description": content.description,
    });

    format!("{}{}", CACHE_KEY_PREFIX, key)
}
