//! Session state machine for rollcall.
//!
//! This module provides a pure, side-effect-free state machine for the
//! session lifecycle. The state machine takes events as input and produces a
//! new state plus a list of actions to execute.
//!
//! The actual I/O (publishing notices, notifying observers) is performed by
//! rollcall-client, not by this module.

use rollcall_types::{Fields, GameState, PlayerId, ReplyTo};

use crate::RejectReason;

/// Session state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not part of any session.
    Disconnected,
    /// Negotiated membership, open for new joins.
    Waiting,
    /// Running, closed to new joins.
    Playing,
    /// Suspended, rejoinable by known participants only.
    Paused,
}

impl SessionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Negotiation
            (Self::Disconnected, Event::JoinCompleted) => (Self::Waiting, vec![]),
            (_, Event::StateReported { state }) if state.is_running() => (state, vec![]),
            (_, Event::Reset) => (Self::Disconnected, vec![]),

            // Leaving
            (Self::Disconnected, Event::LeaveRequested) => (Self::Disconnected, vec![]),
            (_, Event::LeaveRequested) => (Self::Disconnected, vec![Action::PublishLeave]),

            // Pausing
            (Self::Waiting | Self::Playing, Event::PauseRequested) => (
                Self::Paused,
                vec![Action::PublishPause, Action::EmitEvent(GameEvent::Paused)],
            ),
            (Self::Waiting | Self::Playing, Event::PauseReceived { .. }) => {
                (Self::Paused, vec![Action::EmitEvent(GameEvent::Paused)])
            }
            (Self::Playing, Event::PeerLost { .. }) => (
                Self::Paused,
                vec![Action::PublishPause, Action::EmitEvent(GameEvent::Paused)],
            ),

            // Start/stop notices are observed, never acted upon
            (state, Event::StartReceived { from }) if state.is_connected() => {
                (state, vec![Action::EmitEvent(GameEvent::Started { by: from })])
            }
            (state, Event::StopReceived { from }) if state.is_connected() => {
                (state, vec![Action::EmitEvent(GameEvent::Stopped { by: from })])
            }

            // Locally negotiated start/stop
            (state, Event::TransitionCompleted { to, by }) if state.is_connected() => {
                transition_to(state, to, by)
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if part of a session.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Check if paused.
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Check if the session is in progress (playing or paused).
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl From<GameState> for SessionState {
    fn from(state: GameState) -> Self {
        match state {
            GameState::Disconnected => Self::Disconnected,
            GameState::Waiting => Self::Waiting,
            GameState::Playing => Self::Playing,
            GameState::Paused => Self::Paused,
        }
    }
}

impl From<SessionState> for GameState {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Disconnected => Self::Disconnected,
            SessionState::Waiting => Self::Waiting,
            SessionState::Playing => Self::Playing,
            SessionState::Paused => Self::Paused,
        }
    }
}

fn transition_to(
    from: SessionState,
    to: SessionState,
    by: PlayerId,
) -> (SessionState, Vec<Action>) {
    if from == to || !to.is_connected() {
        return (from, vec![]);
    }
    let event = match to {
        SessionState::Playing => Some(GameEvent::Started { by }),
        SessionState::Waiting => Some(GameEvent::Stopped { by }),
        SessionState::Paused => Some(GameEvent::Paused),
        SessionState::Disconnected => None,
    };
    (to, event.map(Action::EmitEvent).into_iter().collect())
}

/// Events that drive the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Join negotiation concluded successfully.
    JoinCompleted,
    /// An accepting peer reported its session state during negotiation.
    StateReported {
        /// The reported state.
        state: SessionState,
    },
    /// Local state must be discarded (failed join, after leave).
    Reset,
    /// Application asked to leave.
    LeaveRequested,
    /// Application asked to pause.
    PauseRequested,
    /// A peer broadcast a pause.
    PauseReceived {
        /// The pausing participant.
        from: PlayerId,
    },
    /// A tracked participant left while the session was in progress.
    PeerLost {
        /// The departed participant.
        player: PlayerId,
    },
    /// A peer broadcast a start.
    StartReceived {
        /// The starting participant.
        from: PlayerId,
    },
    /// A peer broadcast a stop.
    StopReceived {
        /// The stopping participant.
        from: PlayerId,
    },
    /// A start/stop protocol concluded with a new state.
    TransitionCompleted {
        /// State to adopt.
        to: SessionState,
        /// Participant that drove the transition.
        by: PlayerId,
    },
}

/// Actions to be executed by rollcall-client.
///
/// These are instructions, not side effects. The client interprets these
/// and performs the actual I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Broadcast a leave notice.
    PublishLeave,
    /// Broadcast a pause notice.
    PublishPause,
    /// Broadcast the local readiness.
    PublishReady {
        /// New readiness.
        ready: bool,
    },
    /// Reply accept to a join request.
    SendAccept {
        /// Requester's reply destination.
        to: ReplyTo,
        /// Local readiness at decision time.
        ready: bool,
        /// Local state at decision time.
        state: SessionState,
    },
    /// Reply reject to a join request.
    SendReject {
        /// Requester's reply destination.
        to: ReplyTo,
        /// Why the request was refused.
        reason: RejectReason,
    },
    /// Emit an event to the application.
    EmitEvent(GameEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
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
    /// The session paused. Players should halt but retain their state.
    Paused,
    /// A participant was admitted.
    PlayerJoined {
        /// The new participant.
        player: PlayerId,
    },
    /// A participant left or dropped out.
    PlayerLeft {
        /// The departed participant.
        player: PlayerId,
    },
    /// A participant changed readiness.
    PlayerReady {
        /// The participant.
        player: PlayerId,
        /// New readiness.
        ready: bool,
    },
    /// A participant found their object.
    PlayerFoundObject {
        /// The participant.
        player: PlayerId,
        /// Their player number.
        player_number: u32,
    },
    /// Traffic on a subscribed team channel.
    TeamMessage {
        /// Full routing key (`team.<id>.<name>`).
        routing_key: String,
        /// Decoded body.
        fields: Fields,
    },
    /// An operation on the dispatch path failed.
    Failure {
        /// What was being attempted.
        context: String,
        /// Error description.
        error: String,
    },
}
