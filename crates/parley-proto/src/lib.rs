//! Parley wire protocol.
//!
//! Two surfaces share these types:
//!
//! - The REST model ([`model`]): friends, groups, chats and messages as the
//!   external API serves them (camelCase JSON).
//! - The real-time frames ([`frame`]): `{ "type": ..., "data": ... }` JSON
//!   objects carried over the WebSocket.
//!
//! Nothing in this crate performs I/O. Decoding is total: every input either
//! produces a typed value or a [`ProtocolError`], never a panic.

#![forbid(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod model;

pub use errors::{ProtocolError, Result};
pub use frame::{
    FrameKind, InboundFrame, OutboundFrame, ReadReceipt, TypingNotice, TypingUpdate, UserStatus,
};
pub use model::{
    Chat, ChatId, ChatKind, Friend, FriendRequest, FriendRequestDirection, FriendRequests,
    FriendSuggestion, Group, GroupId, LoginResponse, Message, MessageId, NewGroup, NewMessage,
    PresenceStatus, User, UserId,
};
