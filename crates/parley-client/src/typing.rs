//! Per-conversation "currently typing" sets.
//!
//! Actors are added by start events and removed by stop events. A start for
//! an actor already in the set moves them to the back so the set stays in
//! most-recent-last order. The derived [`TypingLabel`] depends only on the
//! set size.

use std::{collections::BTreeMap, fmt, time::Duration};

use parley_proto::{ChatId, UserId};

/// What to show under a conversation about who is typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingLabel {
    /// Nobody is typing.
    None,
    /// Exactly one actor is typing.
    Single(UserId),
    /// More than one actor is typing.
    Many(usize),
}

impl TypingLabel {
    fn from_actors(actors: &[UserId]) -> Self {
        match actors {
            [] => Self::None,
            [only] => Self::Single(*only),
            many => Self::Many(many.len()),
        }
    }

    /// Number of typing actors the label stands for.
    pub fn count(self) -> usize {
        match self {
            Self::None => 0,
            Self::Single(_) => 1,
            Self::Many(n) => n,
        }
    }
}

impl fmt::Display for TypingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Single(_) => f.write_str("Someone is typing..."),
            Self::Many(n) => write!(f, "{n} people are typing..."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TypingEntry<I> {
    user_id: UserId,
    since: I,
}

/// Typing sets for every conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingTracker<I> {
    chats: BTreeMap<ChatId, Vec<TypingEntry<I>>>,
}

impl<I> Default for TypingTracker<I> {
    fn default() -> Self {
        Self { chats: BTreeMap::new() }
    }
}

impl<I> TypingTracker<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a start/stop event. Returns whether the set changed.
    pub fn set_typing(&mut self, chat_id: &ChatId, user_id: UserId, is_typing: bool, now: I) -> bool {
        let entries = self.chats.entry(chat_id.clone()).or_default();
        let before = entries.len();
        entries.retain(|e| e.user_id != user_id);
        let removed = entries.len() != before;

        if is_typing {
            entries.push(TypingEntry { user_id, since: now });
        }
        if entries.is_empty() {
            self.chats.remove(chat_id);
        }

        is_typing || removed
    }

    /// Actors typing in a conversation, most recent last.
    pub fn typing_in(&self, chat_id: &ChatId) -> Vec<UserId> {
        self.chats.get(chat_id).map(|e| e.iter().map(|e| e.user_id).collect()).unwrap_or_default()
    }

    /// Whether `user_id` is typing in `chat_id`.
    pub fn is_typing(&self, chat_id: &ChatId, user_id: UserId) -> bool {
        self.chats.get(chat_id).is_some_and(|e| e.iter().any(|e| e.user_id == user_id))
    }

    /// Label for a conversation.
    pub fn label(&self, chat_id: &ChatId) -> TypingLabel {
        TypingLabel::from_actors(&self.typing_in(chat_id))
    }

    /// Drop actors whose last start event is at least `ttl` old.
    ///
    /// Returns the removed `(chat, actor)` pairs.
    pub fn expire(&mut self, now: I, ttl: Duration) -> Vec<(ChatId, UserId)> {
        let mut expired = Vec::new();
        for (chat_id, entries) in &mut self.chats {
            entries.retain(|e| {
                let stale = now >= e.since && now - e.since >= ttl;
                if stale {
                    expired.push((chat_id.clone(), e.user_id));
                }
                !stale
            });
        }
        self.chats.retain(|_, entries| !entries.is_empty());
        expired
    }

    /// When the oldest typing actor goes stale.
    pub fn next_expiry(&self, ttl: Duration) -> Option<I>
    where
        I: std::ops::Add<Duration, Output = I>,
    {
        self.chats.values().flatten().map(|e| e.since + ttl).min()
    }

    /// Whether [`Self::expire`] would remove anything.
    pub fn has_expired(&self, now: I, ttl: Duration) -> bool {
        self.chats.values().flatten().any(|e| now >= e.since && now - e.since >= ttl)
    }

    /// Forget a conversation entirely.
    pub fn clear_chat(&mut self, chat_id: &ChatId) {
        self.chats.remove(chat_id);
    }

    /// Forget every conversation.
    pub fn clear(&mut self) {
        self.chats.clear();
    }

    /// Conversations with at least one typing actor.
    pub fn active_chats(&self) -> impl Iterator<Item = &ChatId> {
        self.chats.keys()
    }
}
