//! Roster bookkeeping.
//!
//! The roster is the authoritative local view of every known participant.
//! It never holds more than its capacity, and it only hands out owned
//! snapshots so callers cannot observe it mid-update.

use std::collections::HashMap;

use rollcall_types::PlayerId;
use thiserror::Error;

/// Default number of participants per session.
pub const DEFAULT_CAPACITY: usize = 4;

/// Whether a participant is still reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// Present in the session.
    Active,
    /// Dropped out while the session was in progress.
    Disconnected,
}

/// What the roster knows about one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Participant identity.
    pub player_id: PlayerId,
    /// Whether the participant is ready to start.
    pub ready: bool,
    /// Reachability.
    pub connectivity: Connectivity,
}

impl ParticipantRecord {
    /// Create an active record.
    pub fn new(player_id: PlayerId, ready: bool) -> Self {
        Self {
            player_id,
            ready,
            connectivity: Connectivity::Active,
        }
    }

    /// Check if the participant is reachable.
    pub fn is_active(&self) -> bool {
        self.connectivity == Connectivity::Active
    }
}

/// Roster errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Adding another participant would exceed capacity.
    #[error("roster is full ({capacity} participants)")]
    Full {
        /// The roster capacity.
        capacity: usize,
    },
}

/// Capacity-bounded mapping from identity to record.
#[derive(Debug, Clone)]
pub struct Roster {
    capacity: usize,
    players: HashMap<PlayerId, ParticipantRecord>,
}

impl Roster {
    /// Create an empty roster. Capacity is at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            players: HashMap::with_capacity(capacity),
        }
    }

    /// Maximum number of participants.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of known participants.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if no participant is known.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Check if the roster is at capacity.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    /// Check if a participant is known.
    pub fn contains(&self, player: &PlayerId) -> bool {
        self.players.contains_key(player)
    }

    /// Look up a participant.
    pub fn get(&self, player: &PlayerId) -> Option<&ParticipantRecord> {
        self.players.get(player)
    }

    /// Register a participant or refresh an existing record.
    ///
    /// Sets readiness and marks the participant active. Fails only when the
    /// participant is new and the roster is full.
    pub fn upsert(&mut self, player: &PlayerId, ready: bool) -> Result<(), RosterError> {
        if let Some(record) = self.players.get_mut(player) {
            record.ready = ready;
            record.connectivity = Connectivity::Active;
            return Ok(());
        }
        if self.is_full() {
            return Err(RosterError::Full {
                capacity: self.capacity,
            });
        }
        self.players
            .insert(player.clone(), ParticipantRecord::new(player.clone(), ready));
        Ok(())
    }

    /// Update readiness of a known participant.
    ///
    /// Returns true only if the value changed.
    pub fn set_ready(&mut self, player: &PlayerId, ready: bool) -> bool {
        match self.players.get_mut(player) {
            Some(record) if record.ready != ready => {
                record.ready = ready;
                true
            }
            _ => false,
        }
    }

    /// Mark a known participant as disconnected, keeping its record.
    ///
    /// Returns false if the participant is unknown.
    pub fn mark_disconnected(&mut self, player: &PlayerId) -> bool {
        match self.players.get_mut(player) {
            Some(record) => {
                record.connectivity = Connectivity::Disconnected;
                true
            }
            None => false,
        }
    }

    /// Remove a participant entirely.
    pub fn remove(&mut self, player: &PlayerId) -> Option<ParticipantRecord> {
        self.players.remove(player)
    }

    /// Clear the roster and reseed it with a single record.
    pub fn reset_to(&mut self, record: ParticipantRecord) {
        self.players.clear();
        self.players.insert(record.player_id.clone(), record);
    }

    /// Owned copy of all records, ordered by identity.
    pub fn snapshot(&self) -> Vec<ParticipantRecord> {
        let mut records: Vec<ParticipantRecord> = self.players.values().cloned().collect();
        records.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        records
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
