//! Admission policy.
//!
//! Every participant answers a join request on its own, by applying
//! [`admit`] to its local view. The function is pure.

use rollcall_types::PlayerId;

use crate::{Roster, SessionState};

/// Outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The requester may join.
    Accept,
    /// The requester is refused.
    Reject(RejectReason),
}

/// Why a join request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No new joins while playing.
    Playing,
    /// Only known participants may rejoin a paused session.
    UnknownPlayer,
    /// The requester is already registered.
    Duplicate,
    /// The roster is at capacity.
    Full,
    /// A disconnected instance admits nobody.
    NotConnected,
}

/// Decide whether `requester` may join, given the local state and roster.
pub fn admit(state: SessionState, roster: &Roster, requester: &PlayerId) -> Admission {
    match state {
        SessionState::Playing => Admission::Reject(RejectReason::Playing),
        SessionState::Paused if roster.contains(requester) => Admission::Accept,
        SessionState::Paused => Admission::Reject(RejectReason::UnknownPlayer),
        SessionState::Waiting if roster.contains(requester) => {
            Admission::Reject(RejectReason::Duplicate)
        }
        SessionState::Waiting if roster.is_full() => Admission::Reject(RejectReason::Full),
        SessionState::Waiting => Admission::Accept,
        SessionState::Disconnected => Admission::Reject(RejectReason::NotConnected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> PlayerId {
        PlayerId::new(name)
    }

    fn roster_of(names: &[&str]) -> Roster {
        let mut roster = Roster::default();
        for name in names {
            roster.upsert(&id(name), false).unwrap();
        }
        roster
    }

    #[test]
    fn playing_rejects_everyone() {
        let roster = roster_of(&["a", "b"]);
        assert_eq!(
            admit(SessionState::Playing, &roster, &id("a")),
            Admission::Reject(RejectReason::Playing)
        );
        assert_eq!(
            admit(SessionState::Playing, &roster, &id("new")),
            Admission::Reject(RejectReason::Playing)
        );
    }

    #[test]
    fn paused_admits_known_players_only() {
        let mut roster = roster_of(&["a", "b"]);
        roster.mark_disconnected(&id("b"));

        assert_eq!(admit(SessionState::Paused, &roster, &id("b")), Admission::Accept);
        assert_eq!(
            admit(SessionState::Paused, &roster, &id("c")),
            Admission::Reject(RejectReason::UnknownPlayer)
        );
    }

    #[test]
    fn waiting_rejects_duplicates() {
        let roster = roster_of(&["a"]);
        assert_eq!(
            admit(SessionState::Waiting, &roster, &id("a")),
            Admission::Reject(RejectReason::Duplicate)
        );
    }

    #[test]
    fn waiting_rejects_when_full() {
        let roster = roster_of(&["a", "b", "c", "d"]);
        assert_eq!(
            admit(SessionState::Waiting, &roster, &id("e")),
            Admission::Reject(RejectReason::Full)
        );
    }

    #[test]
    fn waiting_accepts_newcomers() {
        let roster = roster_of(&["a", "b", "c"]);
        assert_eq!(admit(SessionState::Waiting, &roster, &id("d")), Admission::Accept);
    }

    #[test]
    fn disconnected_admits_nobody() {
        let roster = roster_of(&["a"]);
        assert_eq!(
            admit(SessionState::Disconnected, &roster, &id("b")),
            Admission::Reject(RejectReason::NotConnected)
        );
    }
}
