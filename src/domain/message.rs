use super::Response;
use crate::constants::{
    CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE, HEADER_IN_REPLY_TO, HEADER_REPLY_ID, HEADER_REPLY_TO,
};
use crate::library::communication::Headers;
use serde::{Deserialize, Serialize};

/// The three protocol fields of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageContent {
    /// What the message is about
    pub verb: String,
    /// Arguments of the verb
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
    /// Free form text for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MessageContent {
    /// Creates content with only a verb
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            parameters: None,
            description: None,
        }
    }

    /// Sets the parameters
    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Extracts the protocol fields of a decoded message, `None` if it has no verb
    pub fn from_response(response: &Response) -> Option<Self> {
        Some(Self {
            verb: response.verb.clone()?,
            parameters: response.parameters.clone(),
            description: response.description.clone(),
        })
    }
}

/// Message ready to be handed to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Transport headers
    pub headers: Headers,
    /// Encoded body
    pub body: String,
}

impl OutgoingMessage {
    /// Builds a request which expects its reply on `reply_to` tagged with `token`
    pub fn request(
        content: &MessageContent,
        token: &str,
        reply_to: &str,
    ) -> Result<Self, serde_json::Error> {
        let mut message = Self::encode(content)?;
        message.set(HEADER_REPLY_ID, token);
        message.set(HEADER_REPLY_TO, reply_to);

        Ok(message)
    }

    /// Builds a reply to the request carrying the token `in_reply_to`
    pub fn reply(content: &MessageContent, in_reply_to: &str) -> Result<Self, serde_json::Error> {
        let mut message = Self::encode(content)?;
        message.set(HEADER_IN_REPLY_TO, in_reply_to);

        Ok(message)
    }

    fn encode(content: &MessageContent) -> Result<Self, serde_json::Error> {
        let mut message = Self {
            headers: Headers::new(),
            body: serde_json::to_string(content)?,
        };

        message.set(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        Ok(message)
    }

    fn set(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_owned(), value.to_owned());
    }
}
