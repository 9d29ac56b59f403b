//! # rollcall-core
//!
//! Pure session logic for rollcall (no I/O, instant tests).
//!
//! This crate implements the session state machine, the roster and the
//! admission policy without any network I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. A [`Session`] answers every inbound message or local
//! request with a list of [`Action`]s; `rollcall-client` interprets them by
//! publishing on the bus and notifying observers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admission;
pub mod roster;
pub mod session;
pub mod state;

pub use admission::{admit, Admission, RejectReason};
pub use roster::{Connectivity, ParticipantRecord, Roster, RosterError, DEFAULT_CAPACITY};
pub use session::{ReplyOutcome, Session, SessionError};
pub use state::{Action, Event, GameEvent, SessionState};
