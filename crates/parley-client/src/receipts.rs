//! Read cursors.
//!
//! Two cursors per conversation: how far the viewer has read (advanced
//! optimistically by `mark_read`) and how far the other participants have
//! read (advanced by inbound `message_read` frames). Both only move forward.

use std::collections::BTreeMap;

use parley_proto::{ChatId, MessageId};

/// Per-conversation read cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReceipts {
    own: BTreeMap<ChatId, MessageId>,
    peers: BTreeMap<ChatId, MessageId>,
}

impl ReadReceipts {
    /// No cursors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the viewer's cursor. Returns whether it moved.
    ///
    /// A `message_id` at or behind the current cursor leaves it unchanged.
    pub fn mark_read(&mut self, chat_id: &ChatId, message_id: MessageId) -> bool {
        advance(&mut self.own, chat_id, message_id)
    }

    /// Advance the peers' cursor from an inbound receipt. Returns whether it
    /// moved.
    pub fn record_peer_read(&mut self, chat_id: &ChatId, message_id: MessageId) -> bool {
        advance(&mut self.peers, chat_id, message_id)
    }

    /// Highest message id the viewer has read.
    pub fn cursor(&self, chat_id: &ChatId) -> Option<MessageId> {
        self.own.get(chat_id).copied()
    }

    /// Highest message id another participant has read.
    pub fn peer_cursor(&self, chat_id: &ChatId) -> Option<MessageId> {
        self.peers.get(chat_id).copied()
    }

    /// Whether a peer has read `message_id`.
    pub fn seen_by_peer(&self, chat_id: &ChatId, message_id: MessageId) -> bool {
        self.peer_cursor(chat_id).is_some_and(|cursor| cursor >= message_id)
    }

    /// Forget a conversation.
    pub fn clear_chat(&mut self, chat_id: &ChatId) {
        self.own.remove(chat_id);
        self.peers.remove(chat_id);
    }
}

fn advance(cursors: &mut BTreeMap<ChatId, MessageId>, chat_id: &ChatId, message_id: MessageId) -> bool {
    match cursors.get_mut(chat_id) {
        Some(cursor) if *cursor >= message_id => false,
        Some(cursor) => {
            *cursor = message_id;
            true
        },
        None => {
            cursors.insert(chat_id.clone(), message_id);
            true
        },
    }
}
