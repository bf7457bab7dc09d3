//! Protocol constants shared between requestors and responders

use std::time::Duration;

/// Header on an outgoing request which carries its correlation token
pub const HEADER_REPLY_ID: &str = "neb-reply-id";
/// Header on an outgoing request naming the queue a reply should be sent to
pub const HEADER_REPLY_TO: &str = "neb-reply-to";
/// Header on a reply naming the correlation token it answers
pub const HEADER_IN_REPLY_TO: &str = "neb-in-reply-to";
/// Header describing the encoding of a message body
pub const HEADER_CONTENT_TYPE: &str = "content-type";
/// Header carrying the session identifier in a connection frame
pub const HEADER_SESSION: &str = "session";

/// Content type used for protocol bodies sent by this crate
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Body of the probe message which forces a queue into existence before subscribing
pub const SENTINEL_BODY: &str = "boo";

/// Prefix of every response cache key
pub const CACHE_KEY_PREFIX: &str = "nebulous:response:";

/// How long a request waits for its reply if neither the target nor the caller specify otherwise
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a cached response lives if the caller does not specify otherwise
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(120);
