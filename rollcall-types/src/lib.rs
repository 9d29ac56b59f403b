//! # rollcall-types
//!
//! Wire format types for the rollcall session membership protocol.
//!
//! This crate provides the foundational types used across all rollcall crates:
//! - [`PlayerId`], [`GameId`], [`ReplyTo`] - Identity and addressing types
//! - [`Topic`] - Logical topics and topic-exchange binding rules
//! - [`Message`] - Protocol message bodies (join, accept, leave, ...)
//! - [`Delivery`] - A message on the bus with its routing metadata
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod delivery;
mod error;
mod ids;
mod messages;
mod topic;

pub use delivery::{Delivery, Properties, CONTENT_TYPE};
pub use error::WireError;
pub use ids::{GameId, PlayerId, ReplyTo};
pub use messages::{
    decode_fields, Accept, Fields, Found, GameState, Join, Message, Notice, Position, Ready,
};
pub use topic::{binding_matches, team_key, team_pattern, Topic, PUBLIC_PATTERN};
