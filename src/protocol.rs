//! Push notifications delivered over the live channel.
//!
//! The server sends JSON objects of the form `{"type": "...", ...payload}`.
//! Only the type matters to the client; the payload is kept for logging and
//! for callers that want it.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("push payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("push payload is not a JSON object")]
    NotAnObject,
    #[error("push payload has no string `type` field")]
    MissingType,
}

/// Known notification types. Anything else is carried as [`MessageKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    PlayerJoined,
    GameStarted,
    MoveMade,
    RematchStarted,
    Other(String),
}

impl MessageKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "player_joined" => MessageKind::PlayerJoined,
            "game_started" => MessageKind::GameStarted,
            "move_made" => MessageKind::MoveMade,
            "rematch_started" => MessageKind::RematchStarted,
            other => MessageKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::PlayerJoined => "player_joined",
            MessageKind::GameStarted => "game_started",
            MessageKind::MoveMade => "move_made",
            MessageKind::RematchStarted => "rematch_started",
            MessageKind::Other(other) => other,
        }
    }

    /// Whether a notification of this kind means the server state changed.
    /// Unknown kinds are ignored.
    pub fn is_state_affecting(&self) -> bool {
        !matches!(self, MessageKind::Other(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub kind: MessageKind,
    pub payload: Map<String, Value>,
}

impl PushMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut payload) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = match payload.remove("type") {
            Some(Value::String(kind)) => MessageKind::parse(&kind),
            _ => return Err(ProtocolError::MissingType),
        };
        Ok(Self { kind, payload })
    }
}

/// A push message together with the game it arrived for.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub game_id: String,
    pub message: PushMessage,
}
