//! REST data model.
//!
//! Mirrors the JSON the external API produces. Field names are camelCase on
//! the wire; timestamps are RFC 3339 strings decoded into [`DateTime<Utc>`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric user identifier (also used for friends and message senders).
pub type UserId = u64;

/// Server-assigned message identifier.
pub type MessageId = u64;

/// Server-assigned group identifier.
pub type GroupId = u64;

/// Opaque conversation identifier.
///
/// The API treats chat ids as strings; no structure is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Wrap a raw chat id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw string form, as used in URLs and frames.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChatId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Online/offline flag for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Connected to the real-time service.
    Online,
    /// Not connected.
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Wire name (`"online"` / `"offline"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// The logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Account id.
    pub id: UserId,
    /// Login handle.
    pub username: String,
    /// Contact address.
    #[serde(default)]
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Last known presence. Absent in some responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PresenceStatus>,
}

/// An accepted friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    /// Friend's user id.
    pub id: UserId,
    /// Login handle.
    pub username: String,
    /// Display name.
    pub full_name: String,
    /// Presence as last reported.
    #[serde(default)]
    pub status: PresenceStatus,
}

/// A group conversation's membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group id.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Member user ids.
    #[serde(default)]
    pub members: Vec<UserId>,
    /// Creator's user id.
    pub created_by: UserId,
}

/// Conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one conversation with a friend.
    Direct,
    /// Conversation backed by a [`Group`].
    Group,
}

/// Conversation summary as listed by `GET /chats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Conversation id.
    pub id: ChatId,
    /// Direct or group.
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Display name.
    pub name: String,
    /// The other party, for direct chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Friend>,
    /// The backing group, for group chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    /// Content of the most recent message.
    #[serde(default)]
    pub last_message: String,
    /// Time of the most recent message.
    pub timestamp: DateTime<Utc>,
    /// Messages received while this chat was not open.
    #[serde(default)]
    pub unread_count: u32,
}

impl Chat {
    /// Whether this is the direct chat with `friend_id`.
    pub fn is_direct_with(&self, friend_id: UserId) -> bool {
        self.kind == ChatKind::Direct && self.participant.as_ref().is_some_and(|p| p.id == friend_id)
    }

    /// Whether this chat is backed by group `group_id`.
    pub fn is_group(&self, group_id: GroupId) -> bool {
        self.kind == ChatKind::Group && self.group.as_ref().is_some_and(|g| g.id == group_id)
    }
}

/// A server-confirmed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub chat_id: ChatId,
    /// Author.
    pub sender_id: UserId,
    /// Author's display name at send time.
    pub sender_name: String,
    /// Text body.
    pub content: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Target conversation.
    pub chat_id: ChatId,
    /// Text body.
    pub content: String,
}

/// Body of `POST /groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    /// Display name.
    pub name: String,
    /// Initial member user ids.
    pub members: Vec<UserId>,
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The authenticated account.
    pub user: User,
}

/// Whether a friend request was received or sent by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestDirection {
    /// Someone asked the viewer.
    Incoming,
    /// The viewer asked someone.
    Outgoing,
}

/// A pending friend request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Request id (used by accept/reject/cancel).
    pub id: u64,
    /// The other party.
    pub user_id: UserId,
    /// Other party's login handle.
    pub username: String,
    /// Other party's display name.
    pub full_name: String,
    /// Other party's presence.
    #[serde(default)]
    pub status: PresenceStatus,
    /// Incoming or outgoing.
    #[serde(rename = "type")]
    pub direction: FriendRequestDirection,
    /// When the request was made.
    pub created_at: DateTime<Utc>,
}

/// Response of `GET /friends/requests`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequests {
    /// Requests awaiting the viewer's decision.
    #[serde(default)]
    pub incoming: Vec<FriendRequest>,
    /// Requests the viewer sent.
    #[serde(default)]
    pub outgoing: Vec<FriendRequest>,
}

/// Entry of `GET /friends/suggestions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendSuggestion {
    /// Suggested user's id.
    pub id: UserId,
    /// Login handle.
    pub username: String,
    /// Display name.
    pub full_name: String,
    /// Presence.
    #[serde(default)]
    pub status: PresenceStatus,
    /// Why the server suggested this user (`search`, `mutual`, ...).
    #[serde(default)]
    pub suggestion_type: String,
    /// Human-readable reason.
    #[serde(default)]
    pub reason: String,
    /// Number of friends in common.
    #[serde(default)]
    pub mutual_friends: u32,
    /// Existing request state between the viewer and this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_status: Option<String>,
}
