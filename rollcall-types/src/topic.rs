//! Logical topics and topic-exchange binding rules.
//!
//! Routing keys are dot-separated words. Bindings follow topic-exchange
//! semantics: `*` matches exactly one word, `#` matches zero or more.

use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// Binding that receives every single-word protocol topic of a game.
pub const PUBLIC_PATTERN: &str = "*";

/// Protocol topics within a game's topic space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Request to join the session (broadcast)
    Join,
    /// Positive answer to a join request (direct reply)
    Accept,
    /// Negative answer to a join request (direct reply)
    Reject,
    /// Voluntary departure
    Leave,
    /// Readiness change
    Ready,
    /// Session paused
    Pause,
    /// Session started
    Start,
    /// Session stopped
    Stop,
    /// Position update
    Position,
    /// Player found their object
    Found,
}

impl Topic {
    /// Every protocol topic.
    pub const ALL: [Topic; 10] = [
        Topic::Join,
        Topic::Accept,
        Topic::Reject,
        Topic::Leave,
        Topic::Ready,
        Topic::Pause,
        Topic::Start,
        Topic::Stop,
        Topic::Position,
        Topic::Found,
    ];

    /// The routing key for this topic.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Join => "join",
            Topic::Accept => "accept",
            Topic::Reject => "reject",
            Topic::Leave => "leave",
            Topic::Ready => "ready",
            Topic::Pause => "pause",
            Topic::Start => "start",
            Topic::Stop => "stop",
            Topic::Position => "position",
            Topic::Found => "found",
        }
    }

    /// Whether this topic is only ever sent to a reply destination.
    pub fn is_reply(self) -> bool {
        matches!(self, Topic::Accept | Topic::Reject)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| WireError::UnknownTopic(s.to_string()))
    }
}

/// Routing key for team-scoped traffic: `team.<id>.<name>`.
pub fn team_key(team: u32, name: &str) -> String {
    format!("team.{}.{}", team, name)
}

/// Binding that receives all traffic of one team.
pub fn team_pattern(team: u32) -> String {
    format!("team.{}.*", team)
}

/// Check whether a routing key matches a binding pattern.
pub fn binding_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            matches_words(rest, key)
                || key
                    .split_first()
                    .is_some_and(|(_, key_rest)| matches_words(pattern, key_rest))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => matches_words(rest, key_rest),
        (Some((word, rest)), Some((key_word, key_rest))) => {
            word == key_word && matches_words(rest, key_rest)
        }
        _ => false,
    }
}
