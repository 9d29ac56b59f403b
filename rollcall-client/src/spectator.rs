//! Read-only observer of a game.
//!
//! A [`SpectatorClient`] binds the public topic of a game and reports
//! session-level broadcasts and player telemetry. It never publishes and
//! never takes part in membership.

use tokio::sync::{broadcast, Mutex};

use rollcall_types::{GameId, Message, PlayerId, PUBLIC_PATTERN};

use crate::client::ClientError;
use crate::config::DEFAULT_EVENT_BUFFER;
use crate::dispatch::Binding;
use crate::transport::{Subscription, Transport};

/// Events observed by a spectator.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectatorEvent {
    /// The session started.
    Started {
        /// Participant that started it.
        by: PlayerId,
    },
    /// The session stopped.
    Stopped {
        /// Participant that stopped it.
        by: PlayerId,
    },
    /// The session paused.
    Paused {
        /// Participant that paused it.
        by: PlayerId,
    },
    /// A participant reported its position.
    PlayerPosition {
        /// The participant.
        player: PlayerId,
        /// Their player number.
        player_number: u32,
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Heading.
        angle: f64,
    },
    /// A participant found their object.
    PlayerFoundObject {
        /// The participant.
        player: PlayerId,
        /// Their player number.
        player_number: u32,
    },
}

impl SpectatorEvent {
    /// Map a broadcast to the event a spectator sees, if any.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Start(notice) => Some(Self::Started {
                by: notice.player_id,
            }),
            Message::Stop(notice) => Some(Self::Stopped {
                by: notice.player_id,
            }),
            Message::Pause(notice) => Some(Self::Paused {
                by: notice.player_id,
            }),
            Message::Position(position) => Some(Self::PlayerPosition {
                player: position.player_id,
                player_number: position.player_number,
                x: position.x,
                y: position.y,
                angle: position.angle,
            }),
            Message::Found(found) => Some(Self::PlayerFoundObject {
                player: found.player_id,
                player_number: found.player_number,
            }),
            _ => None,
        }
    }
}

/// Spectates one game.
pub struct SpectatorClient<T: Transport> {
    game: GameId,
    transport: T,
    events: broadcast::Sender<SpectatorEvent>,
    binding: Mutex<Option<Binding>>,
}

impl<T: Transport> SpectatorClient<T> {
    /// Create a stopped spectator.
    pub fn new(game: impl Into<GameId>, transport: T) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Self {
            game: game.into(),
            transport,
            events,
            binding: Mutex::new(None),
        }
    }

    /// The spectated game.
    pub fn game_id(&self) -> &GameId {
        &self.game
    }

    /// Subscribe to spectator events.
    pub fn events(&self) -> broadcast::Receiver<SpectatorEvent> {
        self.events.subscribe()
    }

    /// Check if spectating.
    pub async fn is_running(&self) -> bool {
        self.binding.lock().await.is_some()
    }

    /// Start spectating. Does nothing if already started.
    pub async fn start(&self) -> Result<(), ClientError> {
        let mut binding = self.binding.lock().await;
        if binding.is_some() {
            return Ok(());
        }

        let subscription = self.transport.subscribe(&self.game, PUBLIC_PATTERN).await?;
        let queue = subscription.queue().to_string();
        let task = tokio::spawn(run(self.events.clone(), subscription));
        *binding = Some(Binding::new(&queue, task));

        tracing::info!("Spectating game {}", self.game);
        Ok(())
    }

    /// Stop spectating. Does nothing if not started.
    pub async fn stop(&self) -> Result<(), ClientError> {
        let Some(binding) = self.binding.lock().await.take() else {
            return Ok(());
        };
        binding.task.abort();
        self.transport.delete_queue(&binding.queue).await?;

        tracing::info!("Stopped spectating game {}", self.game);
        Ok(())
    }
}

async fn run(events: broadcast::Sender<SpectatorEvent>, mut subscription: Subscription) {
    while let Some(delivery) = subscription.recv().await {
        match delivery.decode() {
            Ok(message) => {
                if let Some(event) = SpectatorEvent::from_message(message) {
                    let _ = events.send(event);
                }
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed {} message: {}", delivery.routing_key, e);
            }
        }
    }
}
