//! Standard invariant checks.
//!
//! These capture properties every session must satisfy after every event.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::BTreeSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// The active chat must be one of the listed conversations.
pub struct ActiveChatInChats;

impl Invariant for ActiveChatInChats {
    fn name(&self) -> &'static str {
        "active_chat_in_chats"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some(active) = &client.active_chat
                && client.chat(active).is_none()
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: active chat {active} not listed", client.id),
                });
            }
        }
        Ok(())
    }
}

/// The open conversation never shows unread messages.
pub struct ActiveChatHasNoUnread;

impl Invariant for ActiveChatHasNoUnread {
    fn name(&self) -> &'static str {
        "active_chat_has_no_unread"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let Some(chat) = client.active_chat.as_ref().and_then(|id| client.chat(id)) else {
                continue;
            };
            if chat.unread_count != 0 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: active chat {} has {} unread",
                        client.id, chat.id, chat.unread_count
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Conversations are listed newest first.
pub struct ChatsOrderedByRecency;

impl Invariant for ChatsOrderedByRecency {
    fn name(&self) -> &'static str {
        "chats_ordered_by_recency"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for pair in client.chats.windows(2) {
                if pair[0].timestamp_ms < pair[1].timestamp_ms {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: {} ({}) listed before newer {} ({})",
                            client.id, pair[0].id, pair[0].timestamp_ms, pair[1].id, pair[1].timestamp_ms
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Messages within a conversation never go back in time.
pub struct MessagesOrdered;

impl Invariant for MessagesOrdered {
    fn name(&self) -> &'static str {
        "messages_ordered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (chat_id, messages) in &client.messages {
                if let Some(pair) = messages.windows(2).find(|p| p[0].timestamp_ms > p[1].timestamp_ms) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {} chat {chat_id}: {:?} at {} before {:?} at {}",
                            client.id, pair[0].id, pair[0].timestamp_ms, pair[1].id, pair[1].timestamp_ms
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A server id appears at most once per conversation.
///
/// Echoes, REST responses and history reloads all deliver the same message;
/// a second copy means reconciliation went wrong.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (chat_id, messages) in &client.messages {
                let mut seen = BTreeSet::new();
                for id in messages.iter().filter_map(|m| m.id) {
                    if !seen.insert(id) {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!("client {} chat {chat_id}: message {id} shown twice", client.id),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Read cursors only move forward.
pub struct ReadCursorMonotonic;

impl Invariant for ReadCursorMonotonic {
    fn name(&self) -> &'static str {
        "read_cursor_monotonic"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (chat_id, history) in &client.cursor_history {
                if let Some(pair) = history.windows(2).find(|p| p[1] < p[0]) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {} chat {chat_id}: cursor moved back {} -> {}",
                            client.id, pair[0], pair[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The viewer is never listed as typing to themselves.
pub struct ViewerNeverTyping;

impl Invariant for ViewerNeverTyping {
    fn name(&self) -> &'static str {
        "viewer_never_typing"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some((chat_id, _)) = client.typing.iter().find(|(_, actors)| actors.contains(&client.id)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {} listed as typing in {chat_id}", client.id),
                });
            }
        }
        Ok(())
    }
}
