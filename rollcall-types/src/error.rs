//! Error types for rollcall wire handling.

use thiserror::Error;

use crate::Topic;

/// Errors that can occur while encoding or decoding bus traffic.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON deserialization failed for a known topic
    #[error("malformed {topic} message: {source}")]
    Decode {
        /// Topic the body was delivered on
        topic: Topic,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// Body is not a flat JSON object
    #[error("body is not a field map: {0}")]
    NotFieldMap(#[source] serde_json::Error),

    /// Routing key does not name a protocol topic
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// A request that needs a reply carried no reply destination
    #[error("{0} message has no reply destination")]
    MissingReplyTo(Topic),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::UnknownTopic("dance".into());
        assert_eq!(err.to_string(), "unknown topic: dance");

        let err = WireError::MissingReplyTo(Topic::Join);
        assert_eq!(err.to_string(), "join message has no reply destination");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
