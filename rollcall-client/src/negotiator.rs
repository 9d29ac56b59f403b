//! Join negotiation.
//!
//! A join broadcasts one request carrying a fresh reply destination and a
//! TTL equal to the join timeout, then gathers replies:
//!
//! - each accept registers the responder and adopts a reported
//!   Playing/Paused state
//! - a full roster concludes with success
//! - the deadline concludes with success
//! - a reject before either concludes with failure
//!
//! Whichever comes first wins. Later replies and a late timer are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use rollcall_core::{ReplyOutcome, SessionError};
use rollcall_types::{Delivery, Join, Message, PlayerId, PUBLIC_PATTERN};

use crate::client::{ClientError, Shared};
use crate::dispatch::{self, Binding};
use crate::transport::{Subscription, Transport};

/// How a negotiation concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The roster reached capacity.
    Filled,
    /// The join timeout elapsed.
    DeadlineElapsed,
    /// A peer refused.
    Rejected {
        /// The refusing participant.
        by: PlayerId,
    },
}

/// Conclusion latch shared by the reply consumer and the timer.
#[derive(Debug)]
pub(crate) struct Negotiation {
    done: AtomicBool,
    completion: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl Negotiation {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let negotiation = Self {
            done: AtomicBool::new(false),
            completion: Mutex::new(Some(tx)),
        };
        (Arc::new(negotiation), rx)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Conclude once. Returns false if already concluded.
    pub(crate) fn conclude(&self, outcome: Outcome) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        let completion = self
            .completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = completion {
            let _ = tx.send(outcome);
        }
        true
    }
}

/// Clears the in-progress flag however the join ends.
struct JoinGuard<'a, T: Transport>(&'a Shared<T>);

impl<T: Transport> Drop for JoinGuard<'_, T> {
    fn drop(&mut self) {
        self.0.end_join();
    }
}

/// Run one join attempt to completion.
pub(crate) async fn join<T: Transport>(shared: &Arc<Shared<T>>) -> Result<(), ClientError> {
    if !shared.try_begin_join() {
        return Err(SessionError::AlreadyConnected.into());
    }
    let _guard = JoinGuard(shared.as_ref());

    let ready = shared.session.lock().await.begin_join()?;
    let timeout = shared.config.join_timeout;

    let replies = shared.transport.reply_queue().await?;
    let queue = replies.queue().to_string();
    let reply_to = replies.reply_to();

    let (negotiation, completion) = Negotiation::new();
    let consumer = tokio::spawn(consume_replies(
        Arc::clone(shared),
        Arc::clone(&negotiation),
        replies,
    ));

    let request = Message::Join(Join {
        player_id: shared.local().clone(),
        is_ready: ready,
    });
    let published = match Delivery::from_message(&request) {
        Ok(delivery) => {
            let delivery = delivery.with_reply_to(reply_to).with_expiration(timeout);
            shared
                .transport
                .publish(&shared.config.game_id, delivery)
                .await
                .map_err(ClientError::from)
        }
        Err(e) => Err(e.into()),
    };
    if let Err(e) = published {
        negotiation.conclude(Outcome::DeadlineElapsed);
        consumer.abort();
        return fail(shared, &queue, e).await;
    }
    tracing::info!(
        "{} requested to join game {} (ready: {})",
        shared.local(),
        shared.config.game_id,
        ready
    );

    let timer = tokio::spawn({
        let shared = Arc::clone(shared);
        let negotiation = Arc::clone(&negotiation);
        async move {
            tokio::time::sleep(timeout).await;
            // Replies are applied under this lock, so none lands after the deadline
            let _session = shared.session.lock().await;
            negotiation.conclude(Outcome::DeadlineElapsed);
        }
    });

    let outcome = completion.await.unwrap_or(Outcome::DeadlineElapsed);
    timer.abort();
    consumer.abort();

    match outcome {
        Outcome::Rejected { by } => {
            tracing::info!("Join to game {} rejected by {}", shared.config.game_id, by);
            fail(shared, &queue, ClientError::Rejected { by }).await
        }
        Outcome::Filled | Outcome::DeadlineElapsed => {
            delete_reply_queue(shared, &queue).await;
            if let Err(e) = joined(shared).await {
                shared.session.lock().await.reset();
                return Err(e);
            }
            Ok(())
        }
    }
}

/// Bind the public topic and enter the session.
async fn joined<T: Transport>(shared: &Arc<Shared<T>>) -> Result<(), ClientError> {
    let subscription = shared
        .transport
        .subscribe(&shared.config.game_id, PUBLIC_PATTERN)
        .await?;
    let queue = subscription.queue().to_string();

    let (state, players) = {
        let mut session = shared.session.lock().await;
        (session.complete_join(), session.roster().len())
    };

    let task = tokio::spawn(dispatch::run_public(Arc::clone(shared), subscription));
    shared.set_public(Binding::new(&queue, task));

    tracing::info!(
        "{} joined game {} in state {:?} with {} player(s)",
        shared.local(),
        shared.config.game_id,
        state,
        players
    );
    Ok(())
}

async fn fail<T: Transport>(
    shared: &Shared<T>,
    queue: &str,
    error: ClientError,
) -> Result<(), ClientError> {
    delete_reply_queue(shared, queue).await;
    shared.session.lock().await.reset();
    Err(error)
}

async fn delete_reply_queue<T: Transport>(shared: &Shared<T>, queue: &str) {
    if let Err(e) = shared.transport.delete_queue(queue).await {
        tracing::warn!("Failed to delete reply queue {}: {}", queue, e);
    }
}

/// Apply replies until the negotiation concludes or the queue goes away.
async fn consume_replies<T: Transport>(
    shared: Arc<Shared<T>>,
    negotiation: Arc<Negotiation>,
    mut replies: Subscription,
) {
    while let Some(delivery) = replies.recv().await {
        let message = match delivery.decode() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring malformed join reply: {}", e);
                continue;
            }
        };

        let mut session = shared.session.lock().await;
        if negotiation.is_done() {
            tracing::debug!("Ignoring late {} from {}", delivery.routing_key, message.sender());
            continue;
        }

        match message {
            Message::Accept(accept) => match session.apply_accept(&accept) {
                ReplyOutcome::Registered { full } => {
                    tracing::debug!(
                        "Accepted by {} ({:?})",
                        accept.player_id,
                        accept.game_state
                    );
                    if full {
                        negotiation.conclude(Outcome::Filled);
                    }
                }
                ReplyOutcome::Ignored => {
                    tracing::debug!("Ignoring accept from {}", accept.player_id);
                }
            },
            Message::Reject(notice) => {
                negotiation.conclude(Outcome::Rejected {
                    by: notice.player_id,
                });
            }
            other => {
                tracing::warn!(
                    "Ignoring unexpected {} on reply queue",
                    other.topic().as_str()
                );
            }
        }
    }
}
