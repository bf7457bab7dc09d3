use crate::constants::HEADER_CONTENT_TYPE;
use crate::library::communication::{Headers, InboundMessage};
use crate::library::helpers::body_to_map;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded reply to a request
///
/// Besides the raw headers and body it carries the three protocol fields. A message without a
/// verb is not considered to follow the protocol, so parameters and description are only ever
/// present together with a verb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Transport headers
    pub headers: Headers,
    /// Raw body
    pub body: String,
    /// Protocol verb
    pub verb: Option<String>,
    /// Protocol parameters
    pub parameters: Option<String>,
    /// Protocol description
    pub description: Option<String>,
}

impl Response {
    /// Decodes a message received from the broker
    ///
    /// Never fails, a body which can not be parsed simply yields no protocol fields.
    pub fn from_transport_message(message: &InboundMessage) -> Self {
        let map = body_to_map(message.header(HEADER_CONTENT_TYPE), &message.body);

        let verb = field(&map, &["verb"]);
        let (parameters, description) = match verb {
            Some(_) => (
                field(&map, &["parameters", "params"]),
                field(&map, &["description", "desc"]),
            ),
            None => (None, None),
        };

        Self {
            headers: message.headers.clone(),
            body: message.body.clone(),
            verb,
            parameters,
            description,
        }
    }

    /// Restores a response from the output of [`to_cache_record`](Response::to_cache_record)
    pub fn from_cache_record(record: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(record)
    }

    /// Serializes all fields into a JSON object
    pub fn to_cache_record(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses the body as JSON, `None` if it is empty or not JSON
    pub fn body_as_structured(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// First of the given keys with a value, non-string values are rendered as JSON
fn field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| match map.get(*key)? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            value => Some(value.to_string()),
        })
        .next()
}
