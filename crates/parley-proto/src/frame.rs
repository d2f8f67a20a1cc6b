//! Real-time frames.
//!
//! Every frame on the WebSocket is a JSON object of the form
//! `{ "type": <kind>, "data": <payload> }`. The server pushes
//! [`InboundFrame`]s; the client emits [`OutboundFrame`]s.
//!
//! Decoding happens in two steps: first the envelope (`type` + raw `data`),
//! then the payload for that kind. Splitting the steps lets callers tell an
//! unknown kind apart from a known kind with a bad payload, which matters
//! for logging dropped frames.
//!
//! # Invariants
//!
//! - Each [`FrameKind`] maps to exactly one payload type.
//! - `decode` never panics; every malformed input is a [`ProtocolError`].

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    errors::{ProtocolError, Result},
    model::{ChatId, Message, MessageId, PresenceStatus, UserId},
};

/// Frame discriminator (the `type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `new_message`
    NewMessage,
    /// `user_status`
    UserStatus,
    /// `typing`
    Typing,
    /// `message_read`
    MessageRead,
}

impl FrameKind {
    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::UserStatus => "user_status",
            Self::Typing => "typing",
            Self::MessageRead => "message_read",
        }
    }

    /// Parse a wire name. `None` for unknown kinds.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "new_message" => Some(Self::NewMessage),
            "user_status" => Some(Self::UserStatus),
            "typing" => Some(Self::Typing),
            "message_read" => Some(Self::MessageRead),
            _ => None,
        }
    }
}

/// `user_status` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    /// User whose presence changed.
    pub user_id: UserId,
    /// New presence.
    pub status: PresenceStatus,
}

/// Inbound `typing` payload (server → client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUpdate {
    /// Conversation being typed in.
    pub chat_id: ChatId,
    /// Who is typing.
    pub user_id: UserId,
    /// Started (`true`) or stopped (`false`).
    pub is_typing: bool,
}

/// Outbound `typing` payload (client → server).
///
/// The server attaches the sender's id before fanning it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// Conversation being typed in.
    pub chat_id: ChatId,
    /// Started (`true`) or stopped (`false`).
    pub is_typing: bool,
}

/// `message_read` payload (both directions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Conversation the message belongs to.
    pub chat_id: ChatId,
    /// Highest message id acknowledged as read.
    pub message_id: MessageId,
}

/// Frames pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A message was persisted (including echoes of our own).
    NewMessage(Message),
    /// A user's presence changed.
    UserStatus(UserStatus),
    /// A user started or stopped typing.
    Typing(TypingUpdate),
    /// A participant read up to a message.
    MessageRead(ReadReceipt),
}

impl InboundFrame {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Malformed` if the envelope is not valid JSON with a
    ///   string `type`
    /// - `ProtocolError::UnknownType` for unrecognized kinds
    /// - `ProtocolError::InvalidPayload` if `data` has the wrong shape
    pub fn decode(raw: &str) -> Result<Self> {
        let (kind, data) = envelope(raw)?;
        match kind {
            FrameKind::NewMessage => payload(kind, data).map(Self::NewMessage),
            FrameKind::UserStatus => payload(kind, data).map(Self::UserStatus),
            FrameKind::Typing => payload(kind, data).map(Self::Typing),
            FrameKind::MessageRead => payload(kind, data).map(Self::MessageRead),
        }
    }

    /// Encode to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Kind of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::NewMessage(_) => FrameKind::NewMessage,
            Self::UserStatus(_) => FrameKind::UserStatus,
            Self::Typing(_) => FrameKind::Typing,
            Self::MessageRead(_) => FrameKind::MessageRead,
        }
    }
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Our typing state changed.
    Typing(TypingNotice),
    /// We read up to a message.
    MessageRead(ReadReceipt),
}

impl OutboundFrame {
    /// Typing notice for `chat_id`.
    pub fn typing(chat_id: ChatId, is_typing: bool) -> Self {
        Self::Typing(TypingNotice { chat_id, is_typing })
    }

    /// Read receipt for `message_id` in `chat_id`.
    pub fn read(chat_id: ChatId, message_id: MessageId) -> Self {
        Self::MessageRead(ReadReceipt { chat_id, message_id })
    }

    /// Decode a text frame sent by a client.
    ///
    /// # Errors
    ///
    /// Same as [`InboundFrame::decode`]. Server-only kinds are reported as
    /// `ProtocolError::UnknownType`.
    pub fn decode(raw: &str) -> Result<Self> {
        let (kind, data) = envelope(raw)?;
        match kind {
            FrameKind::Typing => payload(kind, data).map(Self::Typing),
            FrameKind::MessageRead => payload(kind, data).map(Self::MessageRead),
            FrameKind::NewMessage | FrameKind::UserStatus => {
                Err(ProtocolError::UnknownType(kind.as_str().to_string()))
            },
        }
    }

    /// Encode to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Kind of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Typing(_) => FrameKind::Typing,
            Self::MessageRead(_) => FrameKind::MessageRead,
        }
    }

    /// Conversation this frame refers to.
    pub fn chat_id(&self) -> &ChatId {
        match self {
            Self::Typing(notice) => &notice.chat_id,
            Self::MessageRead(receipt) => &receipt.chat_id,
        }
    }
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

fn envelope(raw: &str) -> Result<(FrameKind, serde_json::Value)> {
    let frame: RawFrame = serde_json::from_str(raw)?;
    let kind = FrameKind::from_wire(&frame.kind).ok_or(ProtocolError::UnknownType(frame.kind))?;
    Ok((kind, frame.data))
}

fn payload<T: DeserializeOwned>(kind: FrameKind, data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| ProtocolError::InvalidPayload { kind: kind.as_str(), reason: e.to_string() })
}
