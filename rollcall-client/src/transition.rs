//! Start/stop extension point.
//!
//! Starting or stopping a session needs agreement between participants that
//! the membership protocol itself does not define. A [`TransitionProtocol`]
//! supplies that agreement: it receives a snapshot of the session, talks to
//! peers over the transport however it likes, and returns the state the
//! local session should adopt.

use async_trait::async_trait;
use rollcall_core::{ParticipantRecord, SessionState};
use rollcall_types::{GameId, PlayerId};

use crate::client::ClientError;
use crate::transport::Transport;

/// Snapshot of a connected session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// The game.
    pub game: GameId,
    /// The local participant.
    pub local: PlayerId,
    /// State when the operation was requested.
    pub state: SessionState,
    /// Roster when the operation was requested.
    pub roster: Vec<ParticipantRecord>,
}

impl SessionView {
    /// Check if every participant is reachable and ready.
    pub fn all_ready(&self) -> bool {
        self.roster.iter().all(|r| r.is_active() && r.ready)
    }
}

/// Negotiates session start and stop.
#[async_trait]
pub trait TransitionProtocol<T: Transport>: Send + Sync + 'static {
    /// Agree on starting the session and return the state to adopt.
    async fn start(&self, transport: &T, view: SessionView) -> Result<SessionState, ClientError>;

    /// Agree on stopping the session and return the state to adopt.
    async fn stop(&self, transport: &T, view: SessionView) -> Result<SessionState, ClientError>;
}
