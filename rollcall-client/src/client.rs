//! GameClient - the main interface for rollcall.
//!
//! This module provides [`GameClient`], the primary API for applications
//! taking part in a game session.
//!
//! # Architecture
//!
//! GameClient keeps a pure [`Session`] (from rollcall-core) behind one lock
//! and interprets the actions it returns to perform actual I/O via the
//! Transport trait.
//!
//! ```text
//! Application → GameClient → Transport → Broker
//!                   ↓
//!            rollcall-core (pure session logic)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rollcall_client::{GameClient, GameConfig, MemoryBus};
//!
//! let bus = MemoryBus::new();
//! let client = GameClient::new(GameConfig::new("maze-7", "team-red"), bus);
//!
//! client.set_ready(true).await?;
//! client.join().await?;
//! let mut events = client.events();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use rollcall_core::{GameEvent, ParticipantRecord, Session, SessionError, SessionState};
use rollcall_types::{
    team_pattern, Delivery, Found, GameId, Message, PlayerId, Position, ReplyTo, WireError,
};

use crate::config::{ConfigError, GameConfig};
use crate::dispatch::{self, Binding};
use crate::negotiator;
use crate::transition::{SessionView, TransitionProtocol};
use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation invoked in the wrong session state.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Encoding or decoding a message failed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// A peer refused the join request.
    #[error("request to join rejected by {by}")]
    Rejected {
        /// The rejecting participant.
        by: PlayerId,
    },

    /// No start/stop protocol is installed.
    #[error("{operation} is not available without a transition protocol")]
    TransitionUnavailable {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Subscriptions owned by a connected client.
#[derive(Debug, Default)]
struct Bindings {
    public: Option<Binding>,
    team: Option<Binding>,
}

/// State shared between the client handle and its background tasks.
pub(crate) struct Shared<T: Transport> {
    pub(crate) config: GameConfig,
    pub(crate) transport: T,
    pub(crate) session: Mutex<Session>,
    pub(crate) events: broadcast::Sender<GameEvent>,
    bindings: std::sync::Mutex<Bindings>,
    joining: AtomicBool,
    transitions: Option<Arc<dyn TransitionProtocol<T>>>,
}

impl<T: Transport> Shared<T> {
    pub(crate) fn new(
        config: GameConfig,
        transport: T,
        transitions: Option<Arc<dyn TransitionProtocol<T>>>,
    ) -> Self {
        let session = Session::new(config.player_id.clone(), config.capacity);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            config,
            transport,
            session: Mutex::new(session),
            events,
            bindings: std::sync::Mutex::new(Bindings::default()),
            joining: AtomicBool::new(false),
            transitions,
        }
    }

    pub(crate) fn local(&self) -> &PlayerId {
        &self.config.player_id
    }

    /// Publish a message on the game's topic space.
    pub(crate) async fn publish(&self, message: &Message) -> Result<(), ClientError> {
        let delivery = Delivery::from_message(message)?;
        self.transport.publish(&self.config.game_id, delivery).await?;
        Ok(())
    }

    /// Send a message straight to a reply destination.
    pub(crate) async fn reply(&self, to: &ReplyTo, message: &Message) -> Result<(), ClientError> {
        let delivery = Delivery::from_message(message)?;
        self.transport.send_reply(to, delivery).await?;
        Ok(())
    }

    /// Notify observers. Having none is fine.
    pub(crate) fn emit(&self, event: GameEvent) {
        let _ = self.events.send(event);
    }

    fn bindings(&self) -> MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_public(&self, binding: Binding) {
        if let Some(stale) = self.bindings().public.replace(binding) {
            stale.task.abort();
        }
    }

    fn set_team(&self, binding: Binding) -> Option<Binding> {
        self.bindings().team.replace(binding)
    }

    fn take_bindings(&self) -> Vec<Binding> {
        let mut bindings = self.bindings();
        bindings.public.take().into_iter().chain(bindings.team.take()).collect()
    }

    /// Mark a join attempt as running. Returns false if one already is.
    pub(crate) fn try_begin_join(&self) -> bool {
        !self.joining.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn end_join(&self) {
        self.joining.store(false, Ordering::SeqCst);
    }
}

/// Client for one participant in one game.
///
/// Cheap to clone; clones share the same session.
pub struct GameClient<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for GameClient<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> GameClient<T> {
    /// Create a disconnected client.
    pub fn new(config: GameConfig, transport: T) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, transport, None)),
        }
    }

    /// Create a client that negotiates start/stop through `protocol`.
    pub fn with_transitions(
        config: GameConfig,
        transport: T,
        protocol: Arc<dyn TransitionProtocol<T>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, transport, Some(protocol))),
        }
    }

    /// Subscribe to session events.
    pub fn events(&self) -> broadcast::Receiver<GameEvent> {
        self.shared.events.subscribe()
    }

    /// The game this client takes part in.
    pub fn game_id(&self) -> &GameId {
        &self.shared.config.game_id
    }

    /// The local participant.
    pub fn player_id(&self) -> &PlayerId {
        self.shared.local()
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        self.shared.session.lock().await.state()
    }

    /// Check if part of a session.
    pub async fn is_connected(&self) -> bool {
        self.shared.session.lock().await.is_connected()
    }

    /// Check if the session is paused.
    pub async fn is_paused(&self) -> bool {
        self.shared.session.lock().await.state().is_paused()
    }

    /// Local readiness.
    pub async fn is_ready(&self) -> bool {
        self.shared.session.lock().await.is_ready()
    }

    /// Copy of the roster, ordered by identity.
    pub async fn roster(&self) -> Vec<ParticipantRecord> {
        self.shared.session.lock().await.roster()
    }

    /// Join the game.
    ///
    /// Broadcasts a join request and gathers replies until the roster is
    /// full or the join timeout elapses. Fails if any peer rejects the
    /// request first, leaving the client disconnected.
    pub async fn join(&self) -> Result<(), ClientError> {
        negotiator::join(&self.shared).await
    }

    /// Leave the game.
    ///
    /// Broadcasts a leave notice when connected, tears down all
    /// subscriptions and resets local state. Safe to call when disconnected.
    pub async fn leave(&self) -> Result<(), ClientError> {
        let (was_connected, actions) = {
            let mut session = self.shared.session.lock().await;
            let was_connected = session.is_connected();
            (was_connected, session.leave())
        };

        let mut result = dispatch::execute(&self.shared, actions).await;

        for binding in self.shared.take_bindings() {
            binding.task.abort();
            if let Err(e) = self.shared.transport.delete_queue(&binding.queue).await {
                tracing::warn!("Failed to delete queue {}: {}", binding.queue, e);
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }

        if was_connected {
            tracing::info!(
                "{} left game {}",
                self.shared.local(),
                self.shared.config.game_id
            );
        }
        result
    }

    /// Pause the session.
    ///
    /// Broadcasts a pause notice unless already paused.
    pub async fn pause(&self) -> Result<(), ClientError> {
        let actions = self.shared.session.lock().await.pause()?;
        if !actions.is_empty() {
            tracing::info!(
                "{} paused game {}",
                self.shared.local(),
                self.shared.config.game_id
            );
        }
        dispatch::execute(&self.shared, actions).await
    }

    /// Change local readiness.
    ///
    /// Broadcasts the change when connected. Setting the current value
    /// again does nothing.
    pub async fn set_ready(&self, ready: bool) -> Result<(), ClientError> {
        let actions = self.shared.session.lock().await.set_ready(ready);
        dispatch::execute(&self.shared, actions).await
    }

    /// Start the session.
    ///
    /// Completion is delegated to the installed transition protocol.
    pub async fn start(&self) -> Result<(), ClientError> {
        let view = self.view().await?;
        if view.state == SessionState::Playing {
            return Ok(());
        }
        let protocol = self
            .shared
            .transitions
            .clone()
            .ok_or(ClientError::TransitionUnavailable { operation: "start" })?;

        let to = protocol.start(&self.shared.transport, view).await?;
        self.complete_transition(to).await
    }

    /// Stop the session.
    ///
    /// Succeeds immediately while waiting; otherwise completion is
    /// delegated to the installed transition protocol.
    pub async fn stop(&self) -> Result<(), ClientError> {
        let view = self.view().await?;
        if view.state == SessionState::Waiting {
            return Ok(());
        }
        let protocol = self
            .shared
            .transitions
            .clone()
            .ok_or(ClientError::TransitionUnavailable { operation: "stop" })?;

        let to = protocol.stop(&self.shared.transport, view).await?;
        self.complete_transition(to).await
    }

    /// Broadcast the local position.
    pub async fn update_position(
        &self,
        player_number: u32,
        x: f64,
        y: f64,
        angle: f64,
    ) -> Result<(), ClientError> {
        self.shared.session.lock().await.ensure_connected()?;
        let message = Message::Position(Position {
            player_id: self.shared.local().clone(),
            player_number,
            x,
            y,
            angle,
        });
        self.shared.publish(&message).await
    }

    /// Broadcast that the local player found their object.
    pub async fn found_object(&self, player_number: u32) -> Result<(), ClientError> {
        self.shared.session.lock().await.ensure_connected()?;
        let message = Message::Found(Found {
            player_id: self.shared.local().clone(),
            player_number,
        });
        self.shared.publish(&message).await
    }

    /// Listen to a team channel (`team.<id>.*`).
    ///
    /// Replaces any previous team subscription.
    pub async fn join_team(&self, team: u32) -> Result<(), ClientError> {
        self.shared.session.lock().await.ensure_connected()?;

        let pattern = team_pattern(team);
        let subscription = self
            .shared
            .transport
            .subscribe(&self.shared.config.game_id, &pattern)
            .await?;
        let queue = subscription.queue().to_string();
        let task = tokio::spawn(dispatch::run_team(Arc::clone(&self.shared), subscription));
        let binding = Binding::new(&queue, task);

        if let Some(stale) = self.shared.set_team(binding) {
            stale.task.abort();
            self.shared.transport.delete_queue(&stale.queue).await?;
        }
        tracing::debug!("{} listening on {}", self.shared.local(), pattern);
        Ok(())
    }

    /// Get the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    async fn view(&self) -> Result<SessionView, ClientError> {
        let session = self.shared.session.lock().await;
        session.ensure_connected()?;
        Ok(SessionView {
            game: self.shared.config.game_id.clone(),
            local: session.local().clone(),
            state: session.state(),
            roster: session.roster(),
        })
    }

    async fn complete_transition(&self, to: SessionState) -> Result<(), ClientError> {
        let actions = self.shared.session.lock().await.complete_transition(to)?;
        tracing::info!(
            "{} moved game {} to {:?}",
            self.shared.local(),
            self.shared.config.game_id,
            to
        );
        dispatch::execute(&self.shared, actions).await
    }
}
