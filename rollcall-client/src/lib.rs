//! # rollcall-client
//!
//! Client library for the rollcall session membership protocol.
//!
//! This is the main library that applications use to take part in a game.
//!
//! ## Features
//!
//! - **Join Negotiation**: deadline-bounded, concluded early by a full roster
//! - **Admission Policy**: peers answer join requests from their own view
//! - **Disconnect Handling**: departures during play pause the session
//! - **Transport Abstraction**: Pluggable publish/subscribe port (in-memory bus included)
//! - **Pure State Machine**: Uses rollcall-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use rollcall_client::{GameClient, GameConfig, MemoryBus};
//!
//! let bus = MemoryBus::new();
//! let client = GameClient::new(GameConfig::new("maze-7", "team-red"), bus);
//!
//! client.join().await?;
//! client.set_ready(true).await?;
//!
//! let mut events = client.events();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
mod dispatch;
mod negotiator;
pub mod spectator;
pub mod transition;
pub mod transport;

pub use client::{ClientError, GameClient};
pub use config::{ConfigError, GameConfig, DEFAULT_EVENT_BUFFER, DEFAULT_JOIN_TIMEOUT};
pub use rollcall_core::{Connectivity, GameEvent, ParticipantRecord, SessionError, SessionState};
pub use spectator::{SpectatorClient, SpectatorEvent};
pub use transition::{SessionView, TransitionProtocol};
pub use transport::{MemoryBus, Subscription, Transport, TransportError};
