//! The session aggregate: local identity, state machine and roster.
//!
//! [`Session`] exposes only whole operations. Each one applies the state
//! machine and the roster together and returns the [`Action`]s the caller
//! must carry out, so a single lock around a `Session` is enough to keep the
//! two consistent.

use rollcall_types::{Accept, PlayerId, ReplyTo};
use thiserror::Error;

use crate::{
    admit, Action, Admission, Event, GameEvent, ParticipantRecord, RejectReason, Roster,
    SessionState,
};

/// Usage errors: operations invoked in the wrong state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Join invoked while already part of a session.
    #[error("already connected to game")]
    AlreadyConnected,

    /// A state-changing operation invoked while disconnected.
    #[error("not connected to game")]
    NotConnected,
}

/// What happened to an accept reply during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The responder was registered.
    Registered {
        /// Whether the roster is now at capacity.
        full: bool,
    },
    /// The reply could not be applied (roster full, or our own identity).
    Ignored,
}

/// Local view of one game session.
#[derive(Debug, Clone)]
pub struct Session {
    local: PlayerId,
    state: SessionState,
    roster: Roster,
}

impl Session {
    /// Create a disconnected session whose roster holds only the local player.
    pub fn new(local: PlayerId, capacity: usize) -> Self {
        let mut roster = Roster::new(capacity);
        roster.reset_to(ParticipantRecord::new(local.clone(), false));
        Self {
            local,
            state: SessionState::new(),
            roster,
        }
    }

    /// The local participant.
    pub fn local(&self) -> &PlayerId {
        &self.local
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if part of a session.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Local readiness.
    pub fn is_ready(&self) -> bool {
        self.roster
            .get(&self.local)
            .map(|record| record.ready)
            .unwrap_or(false)
    }

    /// Owned copy of the roster, ordered by identity.
    pub fn roster(&self) -> Vec<ParticipantRecord> {
        self.roster.snapshot()
    }

    /// Look up one participant.
    pub fn participant(&self, player: &PlayerId) -> Option<ParticipantRecord> {
        self.roster.get(player).cloned()
    }

    /// Fail with [`SessionError::NotConnected`] unless part of a session.
    pub fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    /// Discard all session state, keeping the local player and its readiness.
    pub fn reset(&mut self) {
        let ready = self.is_ready();
        self.apply(Event::Reset);
        self.roster
            .reset_to(ParticipantRecord::new(self.local.clone(), ready));
    }

    // ===========================================
    // Requester side
    // ===========================================

    /// Prepare a join attempt.
    ///
    /// Resets local state and returns the readiness to advertise.
    pub fn begin_join(&mut self) -> Result<bool, SessionError> {
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }
        self.reset();
        Ok(self.is_ready())
    }

    /// Apply an accept reply received during negotiation.
    pub fn apply_accept(&mut self, reply: &Accept) -> ReplyOutcome {
        if reply.player_id == self.local {
            return ReplyOutcome::Ignored;
        }
        if self.roster.upsert(&reply.player_id, reply.is_ready).is_err() {
            return ReplyOutcome::Ignored;
        }
        self.apply(Event::StateReported {
            state: reply.game_state.into(),
        });
        ReplyOutcome::Registered {
            full: self.roster.is_full(),
        }
    }

    /// Conclude a successful negotiation.
    pub fn complete_join(&mut self) -> SessionState {
        self.apply(Event::JoinCompleted);
        self.state
    }

    // ===========================================
    // Responder side
    // ===========================================

    /// Decide on a join request and register the requester if admitted.
    ///
    /// A request carrying the local identity is always a duplicate.
    pub fn handle_join(
        &mut self,
        requester: &PlayerId,
        ready: bool,
        reply_to: ReplyTo,
    ) -> Vec<Action> {
        let admission = match admit(self.state, &self.roster, requester) {
            Admission::Accept if requester == &self.local => {
                Admission::Reject(RejectReason::Duplicate)
            }
            Admission::Accept => match self.roster.upsert(requester, ready) {
                Ok(()) => Admission::Accept,
                Err(_) => Admission::Reject(RejectReason::Full),
            },
            rejected => rejected,
        };

        match admission {
            Admission::Accept => vec![
                Action::SendAccept {
                    to: reply_to,
                    ready: self.is_ready(),
                    state: self.state,
                },
                Action::EmitEvent(GameEvent::PlayerJoined {
                    player: requester.clone(),
                }),
            ],
            Admission::Reject(reason) => vec![Action::SendReject {
                to: reply_to,
                reason,
            }],
        }
    }

    /// React to a voluntary-leave notice.
    pub fn handle_leave(&mut self, player: &PlayerId) -> Vec<Action> {
        let left = vec![Action::EmitEvent(GameEvent::PlayerLeft {
            player: player.clone(),
        })];
        match self.state {
            SessionState::Waiting => match self.roster.remove(player) {
                Some(_) => left,
                None => vec![],
            },
            SessionState::Playing | SessionState::Paused => {
                if !self.roster.mark_disconnected(player) {
                    return vec![];
                }
                let mut actions = left;
                actions.extend(self.apply(Event::PeerLost {
                    player: player.clone(),
                }));
                actions
            }
            SessionState::Disconnected => vec![],
        }
    }

    /// React to a readiness broadcast.
    pub fn handle_ready(&mut self, player: &PlayerId, ready: bool) -> Vec<Action> {
        if self.is_connected() && self.roster.set_ready(player, ready) {
            vec![Action::EmitEvent(GameEvent::PlayerReady {
                player: player.clone(),
                ready,
            })]
        } else {
            vec![]
        }
    }

    /// React to a pause broadcast.
    pub fn handle_pause(&mut self, from: &PlayerId) -> Vec<Action> {
        self.apply(Event::PauseReceived { from: from.clone() })
    }

    /// React to a start broadcast.
    pub fn handle_start(&mut self, from: &PlayerId) -> Vec<Action> {
        self.apply(Event::StartReceived { from: from.clone() })
    }

    /// React to a stop broadcast.
    pub fn handle_stop(&mut self, from: &PlayerId) -> Vec<Action> {
        self.apply(Event::StopReceived { from: from.clone() })
    }

    /// React to a found broadcast.
    pub fn handle_found(&self, player: &PlayerId, player_number: u32) -> Vec<Action> {
        if !self.is_connected() {
            return vec![];
        }
        vec![Action::EmitEvent(GameEvent::PlayerFoundObject {
            player: player.clone(),
            player_number,
        })]
    }

    // ===========================================
    // Local operations
    // ===========================================

    /// Change local readiness.
    ///
    /// Broadcasts only when the value changes and the session is connected.
    pub fn set_ready(&mut self, ready: bool) -> Vec<Action> {
        let local = self.local.clone();
        if !self.roster.set_ready(&local, ready) {
            return vec![];
        }
        if self.is_connected() {
            vec![Action::PublishReady { ready }]
        } else {
            vec![]
        }
    }

    /// Pause the session.
    pub fn pause(&mut self) -> Result<Vec<Action>, SessionError> {
        self.ensure_connected()?;
        Ok(self.apply(Event::PauseRequested))
    }

    /// Leave the session and reset.
    pub fn leave(&mut self) -> Vec<Action> {
        let actions = self.apply(Event::LeaveRequested);
        self.reset();
        actions
    }

    /// Adopt the outcome of a start/stop protocol.
    pub fn complete_transition(&mut self, to: SessionState) -> Result<Vec<Action>, SessionError> {
        self.ensure_connected()?;
        let by = self.local.clone();
        Ok(self.apply(Event::TransitionCompleted { to, by }))
    }

    fn apply(&mut self, event: Event) -> Vec<Action> {
        let (state, actions) = self.state.on_event(event);
        self.state = state;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Connectivity;
    use rollcall_types::GameState;

    fn id(name: &str) -> PlayerId {
        PlayerId::new(name)
    }

    fn accept(name: &str, ready: bool, state: GameState) -> Accept {
        Accept {
            player_id: id(name),
            is_ready: ready,
            game_state: state,
        }
    }

    /// A session that joined alone and is now Waiting.
    fn waiting(name: &str) -> Session {
        let mut session = Session::new(id(name), 4);
        session.begin_join().unwrap();
        session.complete_join();
        session
    }

    fn emitted(actions: &[Action]) -> Vec<GameEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::EmitEvent(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn new_session_holds_local_player_only() {
        let session = Session::new(id("a"), 4);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.roster(), vec![ParticipantRecord::new(id("a"), false)]);
    }

    // ===========================================
    // Negotiation Tests
    // ===========================================

    #[test]
    fn join_while_connected_is_a_usage_error() {
        let mut session = waiting("a");
        assert_eq!(session.begin_join(), Err(SessionError::AlreadyConnected));
        assert_eq!(session.state(), SessionState::Waiting);
    }

    #[test]
    fn solitary_join_ends_waiting() {
        let session = waiting("a");
        assert_eq!(session.state(), SessionState::Waiting);
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn join_advertises_last_readiness() {
        let mut session = Session::new(id("a"), 4);
        session.set_ready(true);
        assert_eq!(session.begin_join(), Ok(true));
    }

    #[test]
    fn accepts_fill_roster_and_report_full() {
        let mut session = Session::new(id("a"), 4);
        session.begin_join().unwrap();

        assert_eq!(
            session.apply_accept(&accept("b", true, GameState::Waiting)),
            ReplyOutcome::Registered { full: false }
        );
        session.apply_accept(&accept("c", false, GameState::Waiting));
        assert_eq!(
            session.apply_accept(&accept("d", false, GameState::Waiting)),
            ReplyOutcome::Registered { full: true }
        );
        assert_eq!(
            session.apply_accept(&accept("e", false, GameState::Waiting)),
            ReplyOutcome::Ignored
        );
        assert_eq!(session.roster().len(), 4);
    }

    #[test]
    fn accept_from_running_session_adopts_state() {
        let mut session = Session::new(id("a"), 4);
        session.begin_join().unwrap();
        session.apply_accept(&accept("b", true, GameState::Paused));

        assert_eq!(session.complete_join(), SessionState::Paused);
    }

    #[test]
    fn failed_join_resets_to_local_only() {
        let mut session = Session::new(id("a"), 4);
        session.set_ready(true);
        session.begin_join().unwrap();
        session.apply_accept(&accept("b", true, GameState::Playing));

        session.reset();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.roster(), vec![ParticipantRecord::new(id("a"), true)]);
    }

    // ===========================================
    // Admission Tests
    // ===========================================

    #[test]
    fn admitted_requester_is_registered_before_reply() {
        let mut session = waiting("a");
        let reply = ReplyTo::random();

        let actions = session.handle_join(&id("b"), true, reply.clone());

        assert_eq!(
            actions[0],
            Action::SendAccept {
                to: reply,
                ready: false,
                state: SessionState::Waiting,
            }
        );
        assert_eq!(
            emitted(&actions),
            vec![GameEvent::PlayerJoined { player: id("b") }]
        );
        assert_eq!(session.participant(&id("b")), Some(ParticipantRecord::new(id("b"), true)));
    }

    #[test]
    fn join_with_local_identity_is_a_duplicate() {
        let mut session = waiting("a");

        let actions = session.handle_join(&id("a"), true, ReplyTo::random());

        assert!(matches!(
            actions.as_slice(),
            [Action::SendReject {
                reason: RejectReason::Duplicate,
                ..
            }]
        ));
        assert!(!session.is_ready());
    }

    #[test]
    fn paused_session_rejects_local_identity() {
        let mut session = waiting("a");
        session.pause().unwrap();

        let actions = session.handle_join(&id("a"), false, ReplyTo::random());

        assert!(matches!(
            actions.as_slice(),
            [Action::SendReject {
                reason: RejectReason::Duplicate,
                ..
            }]
        ));
    }

    #[test]
    fn duplicate_join_is_rejected_without_mutation() {
        let mut session = waiting("a");
        session.handle_join(&id("b"), false, ReplyTo::random());
        let before = session.roster();

        let actions = session.handle_join(&id("b"), true, ReplyTo::random());

        assert!(matches!(
            actions.as_slice(),
            [Action::SendReject {
                reason: RejectReason::Duplicate,
                ..
            }]
        ));
        assert_eq!(session.roster(), before);
    }

    #[test]
    fn disconnected_session_rejects_requests() {
        let mut session = Session::new(id("a"), 4);
        let actions = session.handle_join(&id("b"), false, ReplyTo::random());
        assert!(matches!(
            actions.as_slice(),
            [Action::SendReject {
                reason: RejectReason::NotConnected,
                ..
            }]
        ));
    }

    #[test]
    fn paused_session_readmits_dropped_player() {
        let mut session = waiting("a");
        session.handle_join(&id("b"), false, ReplyTo::random());
        session.complete_transition(SessionState::Playing).unwrap();
        session.handle_leave(&id("b"));
        assert_eq!(session.state(), SessionState::Paused);

        let actions = session.handle_join(&id("b"), true, ReplyTo::random());

        assert!(matches!(actions[0], Action::SendAccept { state: SessionState::Paused, .. }));
        assert!(session.participant(&id("b")).unwrap().is_active());
    }

    // ===========================================
    // Leave / Pause Tests
    // ===========================================

    #[test]
    fn leave_while_waiting_removes_player() {
        let mut session = waiting("a");
        session.handle_join(&id("b"), false, ReplyTo::random());

        let actions = session.handle_leave(&id("b"));

        assert_eq!(emitted(&actions), vec![GameEvent::PlayerLeft { player: id("b") }]);
        assert!(session.participant(&id("b")).is_none());
        assert_eq!(session.state(), SessionState::Waiting);
    }

    #[test]
    fn leave_while_playing_marks_disconnected_and_pauses() {
        let mut session = waiting("a");
        session.handle_join(&id("b"), false, ReplyTo::random());
        session.complete_transition(SessionState::Playing).unwrap();

        let actions = session.handle_leave(&id("b"));

        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(
            session.participant(&id("b")).unwrap().connectivity,
            Connectivity::Disconnected
        );
        assert!(actions.contains(&Action::PublishPause));
        assert!(emitted(&actions).contains(&GameEvent::Paused));
    }

    #[test]
    fn leave_of_unknown_player_while_playing_is_ignored() {
        let mut session = waiting("a");
        session.complete_transition(SessionState::Playing).unwrap();

        let actions = session.handle_leave(&id("ghost"));

        assert!(actions.is_empty());
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[test]
    fn pause_requires_connection() {
        let mut session = Session::new(id("a"), 4);
        assert_eq!(session.pause(), Err(SessionError::NotConnected));
    }

    #[test]
    fn local_leave_publishes_and_resets() {
        let mut session = waiting("a");
        session.handle_join(&id("b"), false, ReplyTo::random());

        let actions = session.leave();

        assert_eq!(actions, vec![Action::PublishLeave]);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.roster().len(), 1);
    }

    // ===========================================
    // Readiness Tests
    // ===========================================

    #[test]
    fn set_ready_broadcasts_only_changes() {
        let mut session = waiting("a");
        assert_eq!(session.set_ready(true), vec![Action::PublishReady { ready: true }]);
        assert!(session.set_ready(true).is_empty());
        assert!(session.is_ready());
    }

    #[test]
    fn set_ready_while_disconnected_is_local_only() {
        let mut session = Session::new(id("a"), 4);
        assert!(session.set_ready(true).is_empty());
        assert!(session.is_ready());
    }

    #[test]
    fn ready_broadcast_updates_peer() {
        let mut session = waiting("a");
        session.handle_join(&id("b"), false, ReplyTo::random());

        let actions = session.handle_ready(&id("b"), true);

        assert_eq!(
            emitted(&actions),
            vec![GameEvent::PlayerReady {
                player: id("b"),
                ready: true
            }]
        );
        assert!(session.participant(&id("b")).unwrap().ready);
        assert!(session.handle_ready(&id("nobody"), true).is_empty());
    }
}
