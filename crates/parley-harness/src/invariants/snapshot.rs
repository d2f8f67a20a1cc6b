//! Observable state snapshots for invariant checking.
//!
//! Snapshots copy what a reader of a session can see at one point in time.
//! Invariants operate on snapshots rather than live state so every check in
//! a pass sees the same data.

use std::{collections::BTreeMap, time::Duration};

use parley_client::Session;
use parley_proto::{ChatId, MessageId, UserId};
use serde::Serialize;

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of one client's session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientSnapshot {
    /// Viewer's user id.
    pub id: UserId,
    /// Open conversation.
    pub active_chat: Option<ChatId>,
    /// Conversations in display order.
    pub chats: Vec<ChatSnapshot>,
    /// Messages per conversation in display order.
    pub messages: BTreeMap<ChatId, Vec<MessageSnapshot>>,
    /// Actors typing per conversation.
    pub typing: BTreeMap<ChatId, Vec<UserId>>,
    /// Read cursors observed so far, oldest first.
    pub cursor_history: BTreeMap<ChatId, Vec<MessageId>>,
}

/// One conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSnapshot {
    /// Conversation id.
    pub id: ChatId,
    /// Unread counter.
    pub unread_count: u32,
    /// Summary timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Summary text.
    pub last_message: String,
}

/// One message entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSnapshot {
    /// Server id, if confirmed.
    pub id: Option<MessageId>,
    /// Author.
    pub sender_id: UserId,
    /// Body.
    pub content: String,
    /// Timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl ClientSnapshot {
    /// Create an empty client snapshot.
    pub fn new(id: UserId) -> Self {
        Self { id, ..Default::default() }
    }

    /// Copy the observable state of a session. Cursor history holds only the
    /// current cursors; callers that track history append to it.
    pub fn from_session<I>(session: &Session<I>) -> Self
    where
        I: Copy + Ord + std::ops::Sub<Output = Duration>,
    {
        let mut snapshot = Self::new(session.viewer().id).with_active_chat(session.active_chat().cloned());

        for chat in session.chats() {
            snapshot.chats.push(ChatSnapshot {
                id: chat.id.clone(),
                unread_count: chat.unread_count,
                timestamp_ms: chat.timestamp.timestamp_millis(),
                last_message: chat.last_message.clone(),
            });

            let messages: Vec<MessageSnapshot> = session
                .messages(&chat.id)
                .iter()
                .map(|m| MessageSnapshot {
                    id: m.id,
                    sender_id: m.sender_id,
                    content: m.content.clone(),
                    timestamp_ms: m.timestamp.timestamp_millis(),
                })
                .collect();
            if !messages.is_empty() {
                snapshot.messages.insert(chat.id.clone(), messages);
            }
            if let Some(cursor) = session.receipts().cursor(&chat.id) {
                snapshot.record_cursor(chat.id.clone(), cursor);
            }
        }

        for chat_id in session.typing().active_chats() {
            snapshot.typing.insert(chat_id.clone(), session.typing().typing_in(chat_id));
        }
        snapshot
    }

    /// Set active chat.
    pub fn with_active_chat(mut self, chat_id: Option<ChatId>) -> Self {
        self.active_chat = chat_id;
        self
    }

    /// Append a conversation summary.
    pub fn with_chat(mut self, id: impl Into<ChatId>, unread_count: u32, timestamp_ms: i64) -> Self {
        self.chats.push(ChatSnapshot {
            id: id.into(),
            unread_count,
            timestamp_ms,
            last_message: String::new(),
        });
        self
    }

    /// Append a message to a conversation.
    pub fn with_message(mut self, chat_id: impl Into<ChatId>, id: Option<MessageId>, timestamp_ms: i64) -> Self {
        self.messages.entry(chat_id.into()).or_default().push(MessageSnapshot {
            id,
            sender_id: self.id,
            content: String::new(),
            timestamp_ms,
        });
        self
    }

    /// Record a cursor observation for history tracking. Repeats of the last
    /// observation are skipped.
    pub fn record_cursor(&mut self, chat_id: ChatId, message_id: MessageId) {
        let history = self.cursor_history.entry(chat_id).or_default();
        if history.last() != Some(&message_id) {
            history.push(message_id);
        }
    }

    /// Look up a conversation summary.
    pub fn chat(&self, chat_id: &ChatId) -> Option<&ChatSnapshot> {
        self.chats.iter().find(|c| &c.id == chat_id)
    }
}
