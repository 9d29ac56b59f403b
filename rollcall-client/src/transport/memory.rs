//! In-memory bus for testing.
//!
//! Routes deliveries between any number of clients sharing one bus, and
//! records traffic for verification. Clones share state.

use super::{QueuedDelivery, Subscription, Transport, TransportError};
use async_trait::async_trait;
use rollcall_types::{binding_matches, Delivery, GameId, ReplyTo};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// In-memory topic exchange.
#[derive(Debug, Default, Clone)]
pub struct MemoryBus {
    inner: Arc<Mutex<MemoryBusInner>>,
}

#[derive(Debug, Default)]
struct MemoryBusInner {
    queues: HashMap<String, Queue>,
    published: Vec<(GameId, Delivery)>,
    replies: Vec<(ReplyTo, Delivery)>,
    next_queue: u64,
    fail_next_publish: Option<String>,
    fail_next_subscribe: Option<String>,
}

#[derive(Debug)]
struct Queue {
    binding: Option<(GameId, String)>,
    sender: mpsc::UnboundedSender<QueuedDelivery>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every delivery published on a game's topic space, in order.
    pub fn published(&self, game: &GameId) -> Vec<Delivery> {
        self.lock()
            .published
            .iter()
            .filter(|(g, _)| g == game)
            .map(|(_, d)| d.clone())
            .collect()
    }

    /// Routing keys of everything published on a game, in order.
    pub fn published_keys(&self, game: &GameId) -> Vec<String> {
        self.published(game)
            .into_iter()
            .map(|d| d.routing_key)
            .collect()
    }

    /// Every direct reply sent, in order.
    pub fn replies(&self) -> Vec<(ReplyTo, Delivery)> {
        self.lock().replies.clone()
    }

    /// Number of live queues.
    pub fn queue_count(&self) -> usize {
        self.lock().queues.len()
    }

    /// Check if a queue exists.
    pub fn has_queue(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }

    /// Cause the next publish() to fail with the given error.
    pub fn fail_next_publish(&self, error: &str) {
        self.lock().fail_next_publish = Some(error.to_string());
    }

    /// Cause the next subscribe() or reply_queue() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        self.lock().fail_next_subscribe = Some(error.to_string());
    }

    fn declare(&self, binding: Option<(GameId, String)>) -> Result<Subscription, TransportError> {
        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(TransportError::SubscribeFailed(error));
        }

        let name = match &binding {
            Some(_) => {
                inner.next_queue += 1;
                format!("amq.gen-{}", inner.next_queue)
            }
            None => ReplyTo::random().as_str().to_string(),
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        inner.queues.insert(name.clone(), Queue { binding, sender });
        Ok(Subscription::new(name, receiver))
    }
}

#[async_trait]
impl Transport for MemoryBus {
    async fn publish(&self, game: &GameId, delivery: Delivery) -> Result<(), TransportError> {
        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_publish.take() {
            return Err(TransportError::PublishFailed(error));
        }

        for queue in inner.queues.values() {
            let routed = match &queue.binding {
                Some((bound, pattern)) => {
                    bound == game && binding_matches(pattern, &delivery.routing_key)
                }
                None => false,
            };
            if routed {
                // A consumer that went away just misses the message
                let _ = queue.sender.send(QueuedDelivery::new(delivery.clone()));
            }
        }
        inner.published.push((game.clone(), delivery));
        Ok(())
    }

    async fn send_reply(&self, to: &ReplyTo, delivery: Delivery) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if let Some(error) = inner.fail_next_publish.take() {
            return Err(TransportError::PublishFailed(error));
        }

        if let Some(queue) = inner.queues.get(to.as_str()) {
            let _ = queue.sender.send(QueuedDelivery::new(delivery.clone()));
        }
        inner.replies.push((to.clone(), delivery));
        Ok(())
    }

    async fn subscribe(
        &self,
        game: &GameId,
        pattern: &str,
    ) -> Result<Subscription, TransportError> {
        self.declare(Some((game.clone(), pattern.to_string())))
    }

    async fn reply_queue(&self) -> Result<Subscription, TransportError> {
        self.declare(None)
    }

    async fn delete_queue(&self, queue: &str) -> Result<(), TransportError> {
        // Dropping the sender ends the subscription
        self.lock().queues.remove(queue);
        Ok(())
    }
}
