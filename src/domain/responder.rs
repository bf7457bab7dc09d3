use super::{MessageContent, OutgoingMessage, Response};
use crate::constants::{HEADER_REPLY_ID, HEADER_REPLY_TO};
use crate::library::communication::{
    BrokerFactory, InboundMessage, MessageConsumer, TransportHandler,
};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

/// Application logic answering requests
#[async_trait]
pub trait RequestProcessor {
    /// Handles a decoded request, returning the content of the reply if there should be one
    async fn process(&self, request: &Response) -> Result<Option<MessageContent>, BoxedError>;
}

/// Consumer which answers requests on behalf of a [`RequestProcessor`]
///
/// Replies are sent to the queue named in the request and carry the request's correlation
/// token. Requests which do not say where to reply to are dropped.
pub struct Responder<F: BrokerFactory, P> {
    transport: Arc<TransportHandler<F>>,
    processor: P,
}

impl<F: BrokerFactory, P> Responder<F, P> {
    /// Creates a new responder sending its replies through the given transport
    pub fn new(transport: Arc<TransportHandler<F>>, processor: P) -> Self {
        Self {
            transport,
            processor,
        }
    }
}

#[async_trait]
impl<F, P> MessageConsumer for Responder<F, P>
where
    F: BrokerFactory,
    P: RequestProcessor + Send + Sync,
{
    async fn consume(&self, message: InboundMessage) -> EmptyResult {
        let (token, reply_to) = match (
            message.header(HEADER_REPLY_ID),
            message.header(HEADER_REPLY_TO),
        ) {
            (Some(token), Some(reply_to)) if !token.is_empty() && !reply_to.is_empty() => {
                (token.to_owned(), reply_to.to_owned())
            }
            _ => {
                debug!("Ignoring message without reply information");
                return Ok(());
            }
        };

        let request = Response::from_transport_message(&message);
        trace!(%token, verb = ?request.verb, "Processing request");

        if let Some(reply) = self.processor.process(&request).await? {
            let outgoing = OutgoingMessage::reply(&reply, &token)?;
            self.transport
                .publish(&reply_to, &outgoing.body, &outgoing.headers)
                .await?;
        }

        Ok(())
    }
}
