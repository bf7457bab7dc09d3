use crate::library::communication::{Headers, InboundMessage};
use serde::{Deserialize, Serialize};

/// Representation of a message inside a queue list
#[derive(Serialize, Deserialize)]
pub(super) struct Envelope {
    #[serde(default)]
    pub headers: Headers,
    pub body: String,
}

impl Envelope {
    /// Entries pushed by foreign producers that are not envelopes are taken as a bare body
    pub fn decode(raw: &str) -> InboundMessage {
        match serde_json::from_str::<Envelope>(raw) {
            Ok(envelope) => InboundMessage::new(envelope.headers, envelope.body),
            Err(_) => InboundMessage::new(Headers::new(), raw),
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_envelopes() {
        let message = Envelope::decode(r#"{"headers":{"a":"b"},"body":"hello"}"#);

        assert_eq!(message.header("a"), Some("b"));
        assert_eq!(message.body, "hello");
    }

    #[test]
    fn take_foreign_entries_as_body() {
        let message = Envelope::decode("verb:ping");

        assert!(message.headers.is_empty());
        assert_eq!(message.body, "verb:ping");
    }
}
