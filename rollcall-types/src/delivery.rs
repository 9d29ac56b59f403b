//! Delivery - a message on the bus together with its routing metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{Message, ReplyTo, Topic, WireError};

/// Content type stamped on every body.
pub const CONTENT_TYPE: &str = "application/json";

/// Per-message properties understood by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Properties {
    /// Where direct replies should be sent
    pub reply_to: Option<ReplyTo>,
    /// Drop the message if it is not consumed within this window
    pub expiration: Option<Duration>,
    /// Unix timestamp (seconds) - informational only
    pub timestamp: u64,
    /// MIME type of the body
    pub content_type: String,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            reply_to: None,
            expiration: None,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            content_type: CONTENT_TYPE.to_string(),
        }
    }
}

/// A body addressed by routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Routing key (a topic name, or a team key)
    pub routing_key: String,
    /// Message properties
    pub properties: Properties,
    /// Encoded body
    pub body: Vec<u8>,
}

impl Delivery {
    /// Create a delivery with default properties.
    pub fn new(routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.into(),
            properties: Properties::default(),
            body,
        }
    }

    /// Encode a protocol message into a delivery on its topic.
    pub fn from_message(message: &Message) -> Result<Self, WireError> {
        Ok(Self::new(message.topic().as_str(), message.to_bytes()?))
    }

    /// Set the reply destination.
    pub fn with_reply_to(mut self, reply_to: ReplyTo) -> Self {
        self.properties.reply_to = Some(reply_to);
        self
    }

    /// Set the time-to-live.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.properties.expiration = Some(expiration);
        self
    }

    /// The protocol topic named by the routing key.
    pub fn topic(&self) -> Result<Topic, WireError> {
        self.routing_key.parse()
    }

    /// Decode the body according to the routing key.
    pub fn decode(&self) -> Result<Message, WireError> {
        Message::from_bytes(self.topic()?, &self.body)
    }

    /// The reply destination, required for requests.
    pub fn reply_to(&self) -> Result<&ReplyTo, WireError> {
        match &self.properties.reply_to {
            Some(reply_to) => Ok(reply_to),
            None => Err(WireError::MissingReplyTo(self.topic()?)),
        }
    }
}
