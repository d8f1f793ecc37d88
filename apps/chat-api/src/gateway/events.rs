//! Wire format for gateway frames.
//!
//! Every frame is a UTF-8 JSON object tagged by `type`. Field names are
//! camelCase on the wire.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::message::Message;
use crate::models::presence::PresenceStatus;
use crate::models::{ChannelId, MessageId, UserId};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a connected client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinChannel { channel_id: ChannelId },
    #[serde(rename_all = "camelCase")]
    LeaveChannel { channel_id: ChannelId },
    #[serde(rename_all = "camelCase")]
    Message {
        channel_id: ChannelId,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart { channel_id: ChannelId },
    #[serde(rename_all = "camelCase")]
    TypingStop { channel_id: ChannelId },
    StatusUpdate { status: PresenceStatus },
}

/// Every `type` a [`ClientEvent`] can carry.
const CLIENT_EVENT_TYPES: &[&str] = &[
    "join-channel",
    "leave-channel",
    "message",
    "typing-start",
    "typing-stop",
    "status-update",
];

impl ClientEvent {
    /// Parse a text frame.
    ///
    /// Unrecognized `type` values yield [`GatewayError::UnknownEvent`] so the
    /// client can be told which type was rejected; anything else that fails
    /// to parse is a [`GatewayError::Protocol`].
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|_| GatewayError::protocol("Invalid message format"))?;

        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(GatewayError::protocol("Message type is required")),
        };

        if !CLIENT_EVENT_TYPES.contains(&kind.as_str()) {
            return Err(GatewayError::UnknownEvent(kind));
        }

        serde_json::from_value(value)
            .map_err(|e| GatewayError::protocol(format!("Invalid {kind} payload: {e}")))
    }

    /// The wire `type` of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChannel { .. } => "join-channel",
            Self::LeaveChannel { .. } => "leave-channel",
            Self::Message { .. } => "message",
            Self::TypingStart { .. } => "typing-start",
            Self::TypingStop { .. } => "typing-stop",
            Self::StatusUpdate { .. } => "status-update",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the gateway sends to connected sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once, to the opening session only.
    #[serde(rename_all = "camelCase")]
    Connected { user_id: UserId, username: String },
    /// Acknowledges a `join-channel` to the joining session.
    #[serde(rename_all = "camelCase")]
    JoinedChannel { channel_id: ChannelId },
    #[serde(rename_all = "camelCase")]
    UserJoined {
        channel_id: ChannelId,
        user: MemberSummary,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        channel_id: ChannelId,
        user_id: UserId,
    },
    Message(ChatMessage),
    #[serde(rename_all = "camelCase")]
    UserTyping {
        channel_id: ChannelId,
        user_id: UserId,
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping {
        channel_id: ChannelId,
        user_id: UserId,
    },
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        user_id: UserId,
        username: String,
        status: PresenceStatus,
    },
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// User descriptor embedded in `user-joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub id: UserId,
    pub username: String,
    pub status: PresenceStatus,
}

/// Payload of an outbound `message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    pub sender_username: String,
    pub content: Option<String>,
    pub message_type: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(message: &Message, sender_username: &str) -> Self {
        Self {
            id: message.id,
            channel_id: message.channel_id,
            sender_id: message.sender_id,
            sender_username: sender_username.to_string(),
            content: message.content.clone(),
            message_type: message.type_.clone(),
            timestamp: message.timestamp(),
        }
    }
}

/// Serialize an event into a text frame payload.
///
/// Serialized once per fan-out; the returned bytes are cheap to clone.
pub fn encode(event: &ServerEvent) -> Option<Utf8Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json.into()),
        Err(err) => {
            tracing::error!(?err, "failed to serialize server event");
            None
        }
    }
}
