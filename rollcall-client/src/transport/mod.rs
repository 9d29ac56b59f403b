//! Transport abstraction for rollcall.
//!
//! This module provides a pluggable publish/subscribe port that abstracts
//! the underlying message broker (a topic exchange per game, in-memory for
//! testing).
//!
//! # Design
//!
//! The transport trait is async and queue-oriented:
//! - `publish()` routes a delivery through a game's topic space
//! - `subscribe()` declares a queue bound to a pattern in that space
//! - `reply_queue()` declares an unbound queue for direct replies
//! - `send_reply()` delivers straight to such a queue
//! - `delete_queue()` removes a queue and ends its subscription
//!
//! # Example
//!
//! ```ignore
//! let bus = MemoryBus::new();
//! let mut sub = bus.subscribe(&game, "*").await?;
//! bus.publish(&game, delivery).await?;
//! let received = sub.recv().await;
//! ```

mod memory;

pub use memory::MemoryBus;

use async_trait::async_trait;
use rollcall_types::{Delivery, GameId, ReplyTo};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Publishing failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Declaring or binding a queue failed.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Deleting a queue failed.
    #[error("queue deletion failed: {0}")]
    DeleteFailed(String),

    /// The broker connection is gone.
    #[error("connection closed")]
    ConnectionClosed,
}

/// A delivery waiting in a queue, with its expiry deadline.
#[derive(Debug, Clone)]
pub struct QueuedDelivery {
    /// The delivery itself.
    pub delivery: Delivery,
    /// Drop the delivery if it is still queued at this instant.
    pub expires_at: Option<Instant>,
}

impl QueuedDelivery {
    /// Enqueue a delivery now, deriving the deadline from its expiration.
    pub fn new(delivery: Delivery) -> Self {
        let expires_at = delivery
            .properties
            .expiration
            .map(|ttl| Instant::now() + ttl);
        Self {
            delivery,
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Consumer end of a declared queue.
///
/// Yields deliveries in order until the queue is deleted.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    receiver: mpsc::UnboundedReceiver<QueuedDelivery>,
}

impl Subscription {
    /// Wrap the receiving end of a queue.
    pub fn new(
        queue: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<QueuedDelivery>,
    ) -> Self {
        Self {
            queue: queue.into(),
            receiver,
        }
    }

    /// Name of the underlying queue.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The queue name as a reply destination.
    pub fn reply_to(&self) -> ReplyTo {
        ReplyTo::new(self.queue.clone())
    }

    /// Receive the next unexpired delivery.
    ///
    /// Returns `None` once the queue has been deleted.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            let queued = self.receiver.recv().await?;
            if queued.is_expired() {
                tracing::trace!(
                    "Dropping expired {} delivery on {}",
                    queued.delivery.routing_key,
                    self.queue
                );
                continue;
            }
            return Some(queued.delivery);
        }
    }
}

/// Transport trait for rollcall's publish/subscribe traffic.
///
/// Implementations handle the underlying broker (AMQP topic exchange,
/// in-memory bus, etc).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Publish a delivery on a game's topic space.
    async fn publish(&self, game: &GameId, delivery: Delivery) -> Result<(), TransportError>;

    /// Send a delivery directly to a reply queue.
    ///
    /// Replies to queues that no longer exist are silently dropped.
    async fn send_reply(&self, to: &ReplyTo, delivery: Delivery) -> Result<(), TransportError>;

    /// Declare an exclusive queue bound to `pattern` on a game's topic space.
    async fn subscribe(&self, game: &GameId, pattern: &str)
        -> Result<Subscription, TransportError>;

    /// Declare an ephemeral queue for direct replies.
    async fn reply_queue(&self) -> Result<Subscription, TransportError>;

    /// Delete a queue, which ends its subscription.
    async fn delete_queue(&self, queue: &str) -> Result<(), TransportError>;
}
