//! Protocol message bodies for rollcall.
//!
//! Every body is a flat JSON object carrying the sender's `playerID`. The
//! topic is not part of the body; it travels as the routing key of the
//! [`Delivery`](crate::Delivery).

use serde::{Deserialize, Serialize};

use crate::{PlayerId, Topic, WireError};

/// A decoded body as a plain field map (for team traffic).
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Session state as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Not part of any session
    Disconnected,
    /// Open for new participants
    Waiting,
    /// Running, closed to new participants
    Playing,
    /// Suspended, open to known participants only
    Paused,
}

/// Request to join, broadcast on `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Join {
    /// Requesting participant
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Requester's readiness at the time of the request
    pub is_ready: bool,
}

/// Acceptance of a join request, sent to the reply destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accept {
    /// Accepting participant
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Responder's readiness
    pub is_ready: bool,
    /// Responder's current session state
    pub game_state: GameState,
}

/// A body that carries only the sender.
///
/// Used by `reject`, `leave`, `pause`, `start` and `stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Sending participant
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
}

/// Readiness change, broadcast on `ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ready {
    /// Participant whose readiness changed
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// New readiness
    pub is_ready: bool,
}

/// Position update, broadcast on `position`.
///
/// Coordinates are relative to the player's starting position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Reporting participant
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Player number within the game
    pub player_number: u32,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Orientation, clockwise from the positive X axis
    pub angle: f64,
}

/// Object found, broadcast on `found`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Found {
    /// Participant that found their object
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Player number within the game
    pub player_number: u32,
}

/// All protocol messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Join request
    Join(Join),
    /// Join accepted
    Accept(Accept),
    /// Join rejected
    Reject(Notice),
    /// Voluntary leave
    Leave(Notice),
    /// Readiness change
    Ready(Ready),
    /// Session paused
    Pause(Notice),
    /// Session started
    Start(Notice),
    /// Session stopped
    Stop(Notice),
    /// Position update
    Position(Position),
    /// Object found
    Found(Found),
}

impl Message {
    /// The topic this message is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Message::Join(_) => Topic::Join,
            Message::Accept(_) => Topic::Accept,
            Message::Reject(_) => Topic::Reject,
            Message::Leave(_) => Topic::Leave,
            Message::Ready(_) => Topic::Ready,
            Message::Pause(_) => Topic::Pause,
            Message::Start(_) => Topic::Start,
            Message::Stop(_) => Topic::Stop,
            Message::Position(_) => Topic::Position,
            Message::Found(_) => Topic::Found,
        }
    }

    /// The participant that sent this message.
    pub fn sender(&self) -> &PlayerId {
        match self {
            Message::Join(m) => &m.player_id,
            Message::Accept(m) => &m.player_id,
            Message::Reject(m)
            | Message::Leave(m)
            | Message::Pause(m)
            | Message::Start(m)
            | Message::Stop(m) => &m.player_id,
            Message::Ready(m) => &m.player_id,
            Message::Position(m) => &m.player_id,
            Message::Found(m) => &m.player_id,
        }
    }

    /// Serialize the body to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let encoded = match self {
            Message::Join(m) => serde_json::to_vec(m),
            Message::Accept(m) => serde_json::to_vec(m),
            Message::Reject(m)
            | Message::Leave(m)
            | Message::Pause(m)
            | Message::Start(m)
            | Message::Stop(m) => serde_json::to_vec(m),
            Message::Ready(m) => serde_json::to_vec(m),
            Message::Position(m) => serde_json::to_vec(m),
            Message::Found(m) => serde_json::to_vec(m),
        };
        encoded.map_err(WireError::Encode)
    }

    /// Deserialize a body that arrived on `topic`.
    pub fn from_bytes(topic: Topic, bytes: &[u8]) -> Result<Self, WireError> {
        let decoded = match topic {
            Topic::Join => serde_json::from_slice(bytes).map(Message::Join),
            Topic::Accept => serde_json::from_slice(bytes).map(Message::Accept),
            Topic::Reject => serde_json::from_slice(bytes).map(Message::Reject),
            Topic::Leave => serde_json::from_slice(bytes).map(Message::Leave),
            Topic::Ready => serde_json::from_slice(bytes).map(Message::Ready),
            Topic::Pause => serde_json::from_slice(bytes).map(Message::Pause),
            Topic::Start => serde_json::from_slice(bytes).map(Message::Start),
            Topic::Stop => serde_json::from_slice(bytes).map(Message::Stop),
            Topic::Position => serde_json::from_slice(bytes).map(Message::Position),
            Topic::Found => serde_json::from_slice(bytes).map(Message::Found),
        };
        decoded.map_err(|source| WireError::Decode { topic, source })
    }
}

/// Decode an arbitrary body as a flat field map.
pub fn decode_fields(bytes: &[u8]) -> Result<Fields, WireError> {
    serde_json::from_slice(bytes).map_err(WireError::NotFieldMap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> PlayerId {
        PlayerId::new("alice")
    }

    #[test]
    fn join_uses_wire_field_names() {
        let msg = Message::Join(Join {
            player_id: alice(),
            is_ready: true,
        });

        let value: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(value, json!({ "playerID": "alice", "isReady": true }));
    }

    #[test]
    fn accept_reports_upper_case_state() {
        let msg = Message::Accept(Accept {
            player_id: alice(),
            is_ready: false,
            game_state: GameState::Paused,
        });

        let value: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "playerID": "alice", "isReady": false, "gameState": "PAUSED" })
        );
    }

    #[test]
    fn position_decodes_from_foreign_json() {
        let body = br#"{"playerID":"bob","playerNumber":2,"x":1.5,"y":-3.0,"angle":90.0}"#;
        let msg = Message::from_bytes(Topic::Position, body).unwrap();

        match msg {
            Message::Position(p) => {
                assert_eq!(p.player_id, PlayerId::new("bob"));
                assert_eq!(p.player_number, 2);
                assert_eq!(p.x, 1.5);
                assert_eq!(p.angle, 90.0);
            }
            other => panic!("Expected Position, got {:?}", other),
        }
    }

    #[test]
    fn missing_field_is_a_decode_error() {
        let result = Message::from_bytes(Topic::Ready, br#"{"playerID":"bob"}"#);
        assert!(matches!(
            result,
            Err(WireError::Decode {
                topic: Topic::Ready,
                ..
            })
        ));
    }

    #[test]
    fn notice_topics_share_one_body() {
        let body = br#"{"playerID":"carol"}"#;
        let leave = Message::from_bytes(Topic::Leave, body).unwrap();
        let pause = Message::from_bytes(Topic::Pause, body).unwrap();

        assert_eq!(leave.topic(), Topic::Leave);
        assert_eq!(pause.topic(), Topic::Pause);
        assert_eq!(leave.sender(), pause.sender());
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let body = br#"{"playerID":"dave","isReady":true,"team":3}"#;
        let msg = Message::from_bytes(Topic::Join, body).unwrap();
        assert_eq!(msg.sender(), &PlayerId::new("dave"));
    }

    #[test]
    fn field_map_rejects_non_objects() {
        assert!(decode_fields(br#"{"score":7}"#).is_ok());
        assert!(matches!(
            decode_fields(b"[1,2,3]"),
            Err(WireError::NotFieldMap(_))
        ));
    }
}
