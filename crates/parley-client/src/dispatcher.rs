//! Inbound frame dispatch.
//!
//! Decodes raw WebSocket text into an [`InboundEvent`] and routes each event
//! kind to exactly one [`InboundHandler`] method. Decoding is total: malformed
//! frames produce a [`ProtocolError`] for the caller to log and drop.
//!
//! The transport gives no dedup key, so handlers must tolerate the same
//! event arriving twice.

use parley_proto::{
    ChatId, FrameKind, InboundFrame, Message, MessageId, PresenceStatus, ProtocolError,
    ReadReceipt, TypingUpdate, UserId, UserStatus,
};

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message was posted to a conversation the viewer belongs to.
    NewMessage(Message),

    /// A user went online or offline.
    PresenceChange {
        /// Whose presence changed.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
    },

    /// A user started or stopped typing.
    TypingChange {
        /// Conversation.
        chat_id: ChatId,
        /// Who is typing.
        user_id: UserId,
        /// Started (`true`) or stopped.
        is_typing: bool,
    },

    /// Another participant read up to a message.
    ReadReceipt {
        /// Conversation.
        chat_id: ChatId,
        /// Newest message they read.
        message_id: MessageId,
    },
}

impl InboundEvent {
    /// Frame kind this event was decoded from.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::NewMessage(_) => FrameKind::NewMessage,
            Self::PresenceChange { .. } => FrameKind::UserStatus,
            Self::TypingChange { .. } => FrameKind::Typing,
            Self::ReadReceipt { .. } => FrameKind::MessageRead,
        }
    }
}

impl From<InboundFrame> for InboundEvent {
    fn from(frame: InboundFrame) -> Self {
        match frame {
            InboundFrame::NewMessage(message) => Self::NewMessage(message),
            InboundFrame::UserStatus(UserStatus { user_id, status }) => {
                Self::PresenceChange { user_id, status }
            },
            InboundFrame::Typing(TypingUpdate { chat_id, user_id, is_typing }) => {
                Self::TypingChange { chat_id, user_id, is_typing }
            },
            InboundFrame::MessageRead(ReadReceipt { chat_id, message_id }) => {
                Self::ReadReceipt { chat_id, message_id }
            },
        }
    }
}

/// Decode one raw frame.
///
/// # Errors
///
/// - `ProtocolError::Malformed` if `raw` is not a `{type, data}` object
/// - `ProtocolError::UnknownType` if `type` is not an inbound kind
/// - `ProtocolError::InvalidPayload` if `data` does not match the kind
pub fn decode(raw: &str) -> Result<InboundEvent, ProtocolError> {
    InboundFrame::decode(raw).map(InboundEvent::from)
}

/// Receives routed inbound events.
pub trait InboundHandler {
    /// Handle [`InboundEvent::NewMessage`].
    fn on_new_message(&mut self, message: Message);

    /// Handle [`InboundEvent::PresenceChange`].
    fn on_presence(&mut self, user_id: UserId, status: PresenceStatus);

    /// Handle [`InboundEvent::TypingChange`].
    fn on_typing(&mut self, chat_id: ChatId, user_id: UserId, is_typing: bool);

    /// Handle [`InboundEvent::ReadReceipt`].
    fn on_read_receipt(&mut self, chat_id: ChatId, message_id: MessageId);
}

/// Route `event` to its handler method.
pub fn dispatch<H: InboundHandler + ?Sized>(handler: &mut H, event: InboundEvent) {
    match event {
        InboundEvent::NewMessage(message) => handler.on_new_message(message),
        InboundEvent::PresenceChange { user_id, status } => handler.on_presence(user_id, status),
        InboundEvent::TypingChange { chat_id, user_id, is_typing } => {
            handler.on_typing(chat_id, user_id, is_typing);
        },
        InboundEvent::ReadReceipt { chat_id, message_id } => {
            handler.on_read_receipt(chat_id, message_id);
        },
    }
}
