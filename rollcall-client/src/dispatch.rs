//! Inbound dispatch and action execution.
//!
//! Each subscription gets one task that decodes deliveries, applies them to
//! the session under its lock, then carries out the resulting actions with
//! the lock released.

use std::sync::Arc;
use tokio::task::JoinHandle;

use rollcall_core::{Action, GameEvent};
use rollcall_types::{decode_fields, Accept, Delivery, Message, Notice, Ready, Topic, WireError};

use crate::client::{ClientError, Shared};
use crate::transport::{Subscription, Transport};

/// A live queue and the task consuming it.
#[derive(Debug)]
pub(crate) struct Binding {
    pub(crate) queue: String,
    pub(crate) task: JoinHandle<()>,
}

impl Binding {
    pub(crate) fn new(queue: &str, task: JoinHandle<()>) -> Self {
        Self {
            queue: queue.to_string(),
            task,
        }
    }
}

/// Carry out session actions.
///
/// Every action is attempted; the first failure is returned.
pub(crate) async fn execute<T: Transport>(
    shared: &Shared<T>,
    actions: Vec<Action>,
) -> Result<(), ClientError> {
    let mut first_error = None;
    for action in actions {
        if let Err(e) = execute_one(shared, action).await {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

async fn execute_one<T: Transport>(shared: &Shared<T>, action: Action) -> Result<(), ClientError> {
    let player_id = shared.local().clone();
    match action {
        Action::PublishLeave => shared.publish(&Message::Leave(Notice { player_id })).await,
        Action::PublishPause => shared.publish(&Message::Pause(Notice { player_id })).await,
        Action::PublishReady { ready } => {
            let message = Message::Ready(Ready {
                player_id,
                is_ready: ready,
            });
            shared.publish(&message).await
        }
        Action::SendAccept { to, ready, state } => {
            let message = Message::Accept(Accept {
                player_id,
                is_ready: ready,
                game_state: state.into(),
            });
            shared.reply(&to, &message).await
        }
        Action::SendReject { to, reason } => {
            tracing::debug!("Rejecting join request ({:?}), replying to {}", reason, to);
            shared.reply(&to, &Message::Reject(Notice { player_id })).await
        }
        Action::EmitEvent(event) => {
            shared.emit(event);
            Ok(())
        }
    }
}

/// Report a dispatch-path failure to observers.
pub(crate) fn report_failure<T: Transport>(shared: &Shared<T>, context: &str, error: ClientError) {
    tracing::warn!("{} failed: {}", context, error);
    shared.emit(GameEvent::Failure {
        context: context.to_string(),
        error: error.to_string(),
    });
}

/// Consume the public `*` binding until the queue is deleted.
pub(crate) async fn run_public<T: Transport>(
    shared: Arc<Shared<T>>,
    mut subscription: Subscription,
) {
    while let Some(delivery) = subscription.recv().await {
        let actions = match handle_public(&shared, &delivery).await {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!("Ignoring malformed {} message: {}", delivery.routing_key, e);
                continue;
            }
        };

        if let Err(e) = execute(&shared, actions).await {
            let context = format!("handling {}", delivery.routing_key);
            report_failure(&shared, &context, e);
        }
    }
    tracing::debug!("Public subscription {} closed", subscription.queue());
}

async fn handle_public<T: Transport>(
    shared: &Shared<T>,
    delivery: &Delivery,
) -> Result<Vec<Action>, WireError> {
    let message = delivery.decode()?;
    // Our own notices come back on the public binding. Joins never do, so a
    // join carrying our identity is another participant and gets a reply.
    if message.topic() != Topic::Join && message.sender() == shared.local() {
        return Ok(vec![]);
    }

    let mut session = shared.session.lock().await;
    let actions = match &message {
        Message::Join(join) => {
            let reply_to = delivery.reply_to()?.clone();
            let actions = session.handle_join(&join.player_id, join.is_ready, reply_to);
            tracing::debug!(
                "Join request from {} in state {:?}: {} action(s)",
                join.player_id,
                session.state(),
                actions.len()
            );
            actions
        }
        Message::Leave(notice) => {
            tracing::debug!("{} left", notice.player_id);
            session.handle_leave(&notice.player_id)
        }
        Message::Ready(ready) => session.handle_ready(&ready.player_id, ready.is_ready),
        Message::Pause(notice) => session.handle_pause(&notice.player_id),
        Message::Start(notice) => session.handle_start(&notice.player_id),
        Message::Stop(notice) => session.handle_stop(&notice.player_id),
        Message::Found(found) => session.handle_found(&found.player_id, found.player_number),
        Message::Position(_) => vec![],
        Message::Accept(_) | Message::Reject(_) => {
            tracing::warn!(
                "Ignoring {} reply from {} on the broadcast topic",
                message.topic().as_str(),
                message.sender()
            );
            vec![]
        }
    };
    Ok(actions)
}

/// Consume a team binding until the queue is deleted.
pub(crate) async fn run_team<T: Transport>(
    shared: Arc<Shared<T>>,
    mut subscription: Subscription,
) {
    while let Some(delivery) = subscription.recv().await {
        match decode_fields(&delivery.body) {
            Ok(fields) => shared.emit(GameEvent::TeamMessage {
                routing_key: delivery.routing_key,
                fields,
            }),
            Err(e) => {
                tracing::warn!("Ignoring malformed {} message: {}", delivery.routing_key, e);
            }
        }
    }
    tracing::debug!("Team subscription {} closed", subscription.queue());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::transport::MemoryBus;
    use rollcall_core::{RejectReason, SessionState};
    use rollcall_types::{GameId, PlayerId, ReplyTo};

    fn shared(bus: &MemoryBus) -> Shared<MemoryBus> {
        Shared::new(GameConfig::new("maze", "alice"), bus.clone(), None)
    }

    #[tokio::test]
    async fn publish_actions_carry_local_identity() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);

        execute(
            &shared,
            vec![Action::PublishReady { ready: true }, Action::PublishPause],
        )
        .await
        .unwrap();

        let published = bus.published(&GameId::new("maze"));
        assert_eq!(
            published[0].decode().unwrap(),
            Message::Ready(Ready {
                player_id: PlayerId::new("alice"),
                is_ready: true,
            })
        );
        assert_eq!(published[1].topic().unwrap(), Topic::Pause);
    }

    #[tokio::test]
    async fn replies_go_to_reply_destination() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let to = ReplyTo::new("reply.1");

        execute(
            &shared,
            vec![
                Action::SendAccept {
                    to: to.clone(),
                    ready: false,
                    state: SessionState::Paused,
                },
                Action::SendReject {
                    to: to.clone(),
                    reason: RejectReason::Playing,
                },
            ],
        )
        .await
        .unwrap();

        let replies = bus.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|(dest, _)| dest == &to));
        assert_eq!(replies[0].1.routing_key, "accept");
        assert_eq!(replies[1].1.routing_key, "reject");
        assert!(bus.published(&GameId::new("maze")).is_empty());
    }

    #[tokio::test]
    async fn execute_runs_everything_and_returns_first_error() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let mut events = shared.events.subscribe();
        bus.fail_next_publish("broker down");

        let result = execute(
            &shared,
            vec![Action::PublishPause, Action::EmitEvent(GameEvent::Paused)],
        )
        .await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(events.recv().await.unwrap(), GameEvent::Paused);
    }

    #[tokio::test]
    async fn failures_are_reported_as_events() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let mut events = shared.events.subscribe();

        report_failure(
            &shared,
            "handling leave",
            ClientError::Transport(crate::transport::TransportError::ConnectionClosed),
        );

        match events.recv().await.unwrap() {
            GameEvent::Failure { context, error } => {
                assert_eq!(context, "handling leave");
                assert!(error.contains("connection closed"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn join_without_reply_destination_is_malformed() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let join = Message::Join(rollcall_types::Join {
            player_id: PlayerId::new("bob"),
            is_ready: false,
        });
        let delivery = Delivery::from_message(&join).unwrap();

        let result = handle_public(&shared, &delivery).await;
        assert!(matches!(result, Err(WireError::MissingReplyTo(Topic::Join))));
    }

    #[tokio::test]
    async fn join_while_disconnected_is_rejected() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let join = Message::Join(rollcall_types::Join {
            player_id: PlayerId::new("bob"),
            is_ready: false,
        });
        let delivery = Delivery::from_message(&join)
            .unwrap()
            .with_reply_to(ReplyTo::new("reply.bob"));

        let actions = handle_public(&shared, &delivery).await.unwrap();
        assert!(matches!(
            actions.as_slice(),
            [Action::SendReject {
                reason: RejectReason::NotConnected,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn join_with_local_identity_is_answered() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        {
            let mut session = shared.session.lock().await;
            session.begin_join().unwrap();
            session.complete_join();
        }
        let join = Message::Join(rollcall_types::Join {
            player_id: PlayerId::new("alice"),
            is_ready: false,
        });
        let delivery = Delivery::from_message(&join)
            .unwrap()
            .with_reply_to(ReplyTo::new("reply.alice"));

        let actions = handle_public(&shared, &delivery).await.unwrap();
        assert!(matches!(
            actions.as_slice(),
            [Action::SendReject {
                reason: RejectReason::Duplicate,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn own_notices_are_filtered() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let pause = Message::Pause(Notice {
            player_id: PlayerId::new("alice"),
        });
        let delivery = Delivery::from_message(&pause).unwrap();

        assert!(handle_public(&shared, &delivery).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn position_broadcasts_are_not_acted_upon() {
        let bus = MemoryBus::new();
        let shared = shared(&bus);
        let position = Message::Position(rollcall_types::Position {
            player_id: PlayerId::new("bob"),
            player_number: 1,
            x: 0.0,
            y: 0.0,
            angle: 0.0,
        });
        let delivery = Delivery::from_message(&position).unwrap();

        assert!(handle_public(&shared, &delivery).await.unwrap().is_empty());
    }
}
