//! Session state.
//!
//! Everything the UI renders lives in one [`Session`]. The client owns it
//! behind an `Arc` and mutates it copy-on-write, so a snapshot handed to a
//! reader never changes underneath it.
//!
//! # Invariants
//!
//! - `chats` is sorted by descending timestamp, ties by ascending chat id.
//! - Messages within a conversation are sorted by timestamp; at equal
//!   timestamps confirmed entries come first (by id), then unconfirmed ones,
//!   then arrival order.
//! - No two entries in a conversation share a server id.
//! - The active chat's unread count is zero.

use std::{cmp::Ordering, collections::BTreeMap};

use chrono::{DateTime, Utc};
use parley_core::ChannelState;
use parley_proto::{
    Chat, ChatId, Friend, Group, GroupId, Message, MessageId, PresenceStatus, User, UserId,
};

use crate::{presence::PresenceMap, receipts::ReadReceipts, typing::TypingTracker};

/// A message as held by the client: confirmed or optimistic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    /// Server id. `None` until the server confirms the message.
    pub id: Option<MessageId>,
    /// Client-side arrival sequence number. Unique within the session.
    pub seq: u64,
    /// Conversation.
    pub chat_id: ChatId,
    /// Author.
    pub sender_id: UserId,
    /// Author's display name.
    pub sender_name: String,
    /// Text body.
    pub content: String,
    /// Server timestamp, or the local send time while unconfirmed.
    pub timestamp: DateTime<Utc>,
}

impl LocalMessage {
    /// Whether the server has confirmed this message.
    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }

    fn confirmed(message: Message, seq: u64) -> Self {
        Self {
            id: Some(message.id),
            seq,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            content: message.content,
            timestamp: message.timestamp,
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.id.is_none().cmp(&other.id.is_none()))
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Result of confirming an optimistic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The optimistic entry now carries the server id.
    Confirmed,
    /// A confirmed copy already existed; the optimistic entry was dropped.
    AlreadyPresent,
    /// No entry with that sequence number exists any more.
    Missing,
}

/// What the realtime indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Realtime is switched off; REST only.
    Disabled,
    /// A connect attempt is in flight.
    Connecting,
    /// Frames flow both ways.
    Connected,
    /// Realtime is wanted but down.
    Disconnected,
}

impl ConnectionStatus {
    /// Short label for display.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Snapshot of everything the viewer can see.
#[derive(Debug, Clone)]
pub struct Session<I> {
    viewer: User,
    friends: Vec<Friend>,
    groups: Vec<Group>,
    chats: Vec<Chat>,
    messages: BTreeMap<ChatId, Vec<LocalMessage>>,
    active_chat: Option<ChatId>,
    typing: TypingTracker<I>,
    presence: PresenceMap,
    receipts: ReadReceipts,
    channel: ChannelState,
    realtime_enabled: bool,
    next_seq: u64,
}

impl<I> Session<I>
where
    I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
{
    /// Empty session for `viewer`.
    pub fn new(viewer: User) -> Self {
        Self {
            viewer,
            friends: Vec::new(),
            groups: Vec::new(),
            chats: Vec::new(),
            messages: BTreeMap::new(),
            active_chat: None,
            typing: TypingTracker::new(),
            presence: PresenceMap::new(),
            receipts: ReadReceipts::new(),
            channel: ChannelState::Idle,
            realtime_enabled: false,
            next_seq: 0,
        }
    }

    /// The logged-in account.
    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    /// Accepted friends.
    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    /// Friends currently online.
    pub fn online_friends(&self) -> Vec<&Friend> {
        self.friends.iter().filter(|f| f.status == PresenceStatus::Online).collect()
    }

    /// Groups the viewer belongs to.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Conversations, newest first.
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// Look up a conversation.
    pub fn chat(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| &c.id == chat_id)
    }

    /// The direct conversation with a friend.
    pub fn direct_chat_with(&self, friend_id: UserId) -> Option<&Chat> {
        self.chats.iter().find(|c| c.is_direct_with(friend_id))
    }

    /// The conversation backed by a group.
    pub fn group_chat(&self, group_id: GroupId) -> Option<&Chat> {
        self.chats.iter().find(|c| c.is_group(group_id))
    }

    /// Messages of a conversation in display order.
    pub fn messages(&self, chat_id: &ChatId) -> &[LocalMessage] {
        self.messages.get(chat_id).map_or(&[], Vec::as_slice)
    }

    /// Newest confirmed message of a conversation.
    pub fn newest_confirmed(&self, chat_id: &ChatId) -> Option<&LocalMessage> {
        self.messages(chat_id).iter().rev().find(|m| m.is_confirmed())
    }

    /// Currently open conversation.
    pub fn active_chat(&self) -> Option<&ChatId> {
        self.active_chat.as_ref()
    }

    /// Sum of unread counts over all conversations.
    pub fn total_unread(&self) -> u32 {
        self.chats.iter().fold(0u32, |sum, c| sum.saturating_add(c.unread_count))
    }

    /// Typing sets.
    pub fn typing(&self) -> &TypingTracker<I> {
        &self.typing
    }

    /// Presence flags.
    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    /// Read cursors.
    pub fn receipts(&self) -> &ReadReceipts {
        &self.receipts
    }

    /// Channel state at the time of the snapshot.
    pub fn channel_state(&self) -> ChannelState {
        self.channel
    }

    /// Whether realtime is switched on.
    pub fn realtime_enabled(&self) -> bool {
        self.realtime_enabled
    }

    /// Realtime indicator.
    pub fn connection_status(&self) -> ConnectionStatus {
        if !self.realtime_enabled {
            return ConnectionStatus::Disabled;
        }
        match self.channel {
            ChannelState::Open => ConnectionStatus::Connected,
            ChannelState::Connecting => ConnectionStatus::Connecting,
            ChannelState::Idle | ChannelState::Closed => ConnectionStatus::Disconnected,
        }
    }

    pub(crate) fn set_channel(&mut self, state: ChannelState, enabled: bool) {
        self.channel = state;
        self.realtime_enabled = enabled;
    }

    pub(crate) fn typing_mut(&mut self) -> &mut TypingTracker<I> {
        &mut self.typing
    }

    pub(crate) fn receipts_mut(&mut self) -> &mut ReadReceipts {
        &mut self.receipts
    }

    pub(crate) fn set_friends(&mut self, friends: Vec<Friend>) {
        self.friends = friends;
    }

    pub(crate) fn set_groups(&mut self, groups: Vec<Group>) {
        self.groups = groups;
    }

    pub(crate) fn add_group(&mut self, group: Group) {
        self.groups.retain(|g| g.id != group.id);
        self.groups.push(group);
    }

    /// Replace the conversation list. The active chat keeps a zero unread
    /// count; if it disappeared it is closed.
    pub(crate) fn set_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
        match self.active_chat.clone() {
            Some(active) if self.chat(&active).is_none() => self.active_chat = None,
            Some(active) => self.reset_unread(&active),
            None => {},
        }
        self.sort_chats();
    }

    /// Record presence and mirror it onto the matching friend.
    pub(crate) fn set_presence(&mut self, user_id: UserId, status: PresenceStatus) {
        self.presence.set_presence(user_id, status);
        for friend in self.friends.iter_mut().filter(|f| f.id == user_id) {
            friend.status = status;
        }
        for chat in &mut self.chats {
            if let Some(participant) = chat.participant.as_mut().filter(|p| p.id == user_id) {
                participant.status = status;
            }
        }
    }

    /// Drop a friend, their direct conversations and everything attached.
    /// Returns the removed conversation ids.
    pub(crate) fn remove_friend(&mut self, friend_id: UserId) -> Vec<ChatId> {
        self.friends.retain(|f| f.id != friend_id);

        let removed: Vec<ChatId> =
            self.chats.iter().filter(|c| c.is_direct_with(friend_id)).map(|c| c.id.clone()).collect();
        self.chats.retain(|c| !c.is_direct_with(friend_id));

        for chat_id in &removed {
            self.messages.remove(chat_id);
            self.typing.clear_chat(chat_id);
            self.receipts.clear_chat(chat_id);
        }
        if self.active_chat.as_ref().is_some_and(|a| removed.contains(a)) {
            self.active_chat = None;
        }
        removed
    }

    /// Make a conversation active and zero its unread count.
    pub(crate) fn activate(&mut self, chat_id: &ChatId) -> bool {
        if self.chat(chat_id).is_none() {
            return false;
        }
        self.active_chat = Some(chat_id.clone());
        self.reset_unread(chat_id);
        true
    }

    pub(crate) fn deactivate(&mut self) -> Option<ChatId> {
        self.active_chat.take()
    }

    pub(crate) fn is_active(&self, chat_id: &ChatId) -> bool {
        self.active_chat.as_ref() == Some(chat_id)
    }

    pub(crate) fn reset_unread(&mut self, chat_id: &ChatId) {
        if let Some(chat) = self.chat_mut(chat_id) {
            chat.unread_count = 0;
        }
    }

    /// Update a conversation summary after a message. Returns whether the
    /// conversation is known.
    pub(crate) fn bump_summary(
        &mut self,
        chat_id: &ChatId,
        content: &str,
        timestamp: DateTime<Utc>,
        count_unread: bool,
    ) -> bool {
        let active = self.is_active(chat_id);
        let Some(chat) = self.chat_mut(chat_id) else {
            return false;
        };

        chat.last_message = content.to_string();
        chat.timestamp = timestamp;
        if active {
            chat.unread_count = 0;
        } else if count_unread {
            chat.unread_count = chat.unread_count.saturating_add(1);
        }
        self.sort_chats();
        true
    }

    /// Whether a conversation already holds a confirmed message with `id`.
    pub(crate) fn contains_message(&self, chat_id: &ChatId, id: MessageId) -> bool {
        self.messages(chat_id).iter().any(|m| m.id == Some(id))
    }

    /// Insert an unconfirmed entry. Returns its sequence number.
    pub(crate) fn push_optimistic(
        &mut self,
        chat_id: ChatId,
        content: String,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        let seq = self.take_seq();
        let entry = LocalMessage {
            id: None,
            seq,
            chat_id: chat_id.clone(),
            sender_id: self.viewer.id,
            sender_name: self.viewer.full_name.clone(),
            content,
            timestamp,
        };
        self.insert_sorted(chat_id, entry);
        seq
    }

    /// Insert a confirmed message unless its id is already present.
    /// Returns whether it was inserted.
    pub(crate) fn push_confirmed(&mut self, message: Message) -> bool {
        if self.contains_message(&message.chat_id, message.id) {
            return false;
        }
        let seq = self.take_seq();
        let chat_id = message.chat_id.clone();
        self.insert_sorted(chat_id, LocalMessage::confirmed(message, seq));
        true
    }

    /// Attach the server's record to the optimistic entry `seq`.
    pub(crate) fn confirm(&mut self, seq: u64, message: &Message) -> Confirmation {
        let duplicate = self.contains_message(&message.chat_id, message.id);
        let Some(entries) = self.messages.get_mut(&message.chat_id) else {
            return Confirmation::Missing;
        };
        let Some(pos) = entries.iter().position(|m| m.seq == seq && !m.is_confirmed()) else {
            return Confirmation::Missing;
        };

        if duplicate {
            entries.remove(pos);
            return Confirmation::AlreadyPresent;
        }

        let entry = &mut entries[pos];
        entry.id = Some(message.id);
        entry.timestamp = message.timestamp;
        entry.content.clone_from(&message.content);
        entry.sender_name.clone_from(&message.sender_name);
        entries.sort_by(LocalMessage::order);
        Confirmation::Confirmed
    }

    /// Remove an unconfirmed entry.
    pub(crate) fn remove_optimistic(&mut self, chat_id: &ChatId, seq: u64) -> Option<LocalMessage> {
        let entries = self.messages.get_mut(chat_id)?;
        let pos = entries.iter().position(|m| m.seq == seq && !m.is_confirmed())?;
        Some(entries.remove(pos))
    }

    /// Merge a freshly loaded history into a conversation.
    ///
    /// Loaded messages replace confirmed entries with the same id. Confirmed
    /// entries not in the history (newer than the fetch) and unconfirmed
    /// entries are kept.
    pub(crate) fn merge_history(&mut self, chat_id: &ChatId, history: Vec<Message>) {
        let existing = self.messages.remove(chat_id).unwrap_or_default();
        let mut merged: Vec<LocalMessage> = Vec::with_capacity(existing.len() + history.len());

        for message in history {
            if message.chat_id != *chat_id || merged.iter().any(|m| m.id == Some(message.id)) {
                continue;
            }
            let seq = existing
                .iter()
                .find(|m| m.id == Some(message.id))
                .map_or_else(|| self.take_seq(), |m| m.seq);
            merged.push(LocalMessage::confirmed(message, seq));
        }
        for entry in existing {
            let superseded = entry.id.is_some_and(|id| merged.iter().any(|m| m.id == Some(id)));
            if !superseded {
                merged.push(entry);
            }
        }

        merged.sort_by(LocalMessage::order);
        self.messages.insert(chat_id.clone(), merged);
    }

    fn chat_mut(&mut self, chat_id: &ChatId) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| &c.id == chat_id)
    }

    fn sort_chats(&mut self) {
        self.chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn insert_sorted(&mut self, chat_id: ChatId, entry: LocalMessage) {
        let entries = self.messages.entry(chat_id).or_default();
        let pos = entries.partition_point(|m| m.order(&entry) != Ordering::Greater);
        entries.insert(pos, entry);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::TimeZone;
    use parley_proto::ChatKind;

    use super::*;

    fn viewer() -> User {
        User {
            id: 1,
            username: "me".into(),
            email: String::new(),
            full_name: "Me".into(),
            status: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn chat(id: &str, secs: i64) -> Chat {
        Chat {
            id: ChatId::new(id),
            kind: ChatKind::Group,
            name: id.to_uppercase(),
            participant: None,
            group: None,
            last_message: String::new(),
            timestamp: at(secs),
            unread_count: 0,
        }
    }

    fn message(id: MessageId, chat_id: &str, secs: i64) -> Message {
        Message {
            id,
            chat_id: ChatId::new(chat_id),
            sender_id: 2,
            sender_name: "Bo".into(),
            content: format!("m{id}"),
            timestamp: at(secs),
        }
    }

    #[test]
    fn chats_sort_newest_first_then_by_id() {
        let mut session = Session::<Instant>::new(viewer());
        session.set_chats(vec![chat("b", 5), chat("a", 5), chat("c", 9)]);

        let order: Vec<_> = session.chats().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn unconfirmed_sorts_after_confirmed_at_same_timestamp() {
        let mut session = Session::<Instant>::new(viewer());
        let c1 = ChatId::new("c1");

        session.push_optimistic(c1.clone(), "draft".into(), at(10));
        session.push_confirmed(message(4, "c1", 10));
        session.push_confirmed(message(3, "c1", 10));
        session.push_confirmed(message(9, "c1", 2));

        let ids: Vec<_> = session.messages(&c1).iter().map(|m| m.id).collect();
        assert_eq!(ids, [Some(9), Some(3), Some(4), None]);
    }

    #[test]
    fn push_confirmed_dedups_by_id() {
        let mut session = Session::<Instant>::new(viewer());

        assert!(session.push_confirmed(message(4, "c1", 1)));
        assert!(!session.push_confirmed(message(4, "c1", 1)));
        assert_eq!(session.messages(&ChatId::new("c1")).len(), 1);
    }

    #[test]
    fn confirm_drops_optimistic_when_copy_exists() {
        let mut session = Session::<Instant>::new(viewer());
        let seq = session.push_optimistic("c1".into(), "m4".into(), at(1));
        session.push_confirmed(message(4, "c1", 1));

        assert_eq!(session.confirm(seq, &message(4, "c1", 1)), Confirmation::AlreadyPresent);
        assert_eq!(session.messages(&ChatId::new("c1")).len(), 1);
    }

    #[test]
    fn merge_history_keeps_newer_and_unconfirmed() {
        let mut session = Session::<Instant>::new(viewer());
        let c1 = ChatId::new("c1");
        session.push_confirmed(message(7, "c1", 7));
        session.push_optimistic(c1.clone(), "draft".into(), at(8));

        session.merge_history(&c1, vec![message(5, "c1", 5), message(6, "c1", 6), message(5, "c1", 5)]);

        let ids: Vec<_> = session.messages(&c1).iter().map(|m| m.id).collect();
        assert_eq!(ids, [Some(5), Some(6), Some(7), None]);
    }

    #[test]
    fn activate_resets_unread() {
        let mut session = Session::<Instant>::new(viewer());
        let mut c1 = chat("c1", 1);
        c1.unread_count = 4;
        session.set_chats(vec![c1, chat("c2", 2)]);

        assert!(session.activate(&ChatId::new("c1")));
        assert_eq!(session.chat(&ChatId::new("c1")).unwrap().unread_count, 0);
        assert!(!session.activate(&ChatId::new("missing")));
    }

    #[test]
    fn connection_status_follows_channel() {
        let mut session = Session::<Instant>::new(viewer());
        assert_eq!(session.connection_status(), ConnectionStatus::Disabled);

        session.set_channel(ChannelState::Connecting, true);
        assert_eq!(session.connection_status().as_str(), "connecting");

        session.set_channel(ChannelState::Closed, true);
        assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    }

    fn friend(id: UserId, name: &str) -> Friend {
        Friend {
            id,
            username: name.to_lowercase(),
            full_name: name.into(),
            status: PresenceStatus::Offline,
        }
    }

    #[test]
    fn presence_and_totals_derive_from_friends_and_chats() {
        let mut session = Session::<Instant>::new(viewer());
        session.set_friends(vec![friend(2, "Bo"), friend(3, "Cy")]);
        let (mut c1, mut c2) = (chat("c1", 1), chat("c2", 2));
        c1.unread_count = 2;
        c2.unread_count = 3;
        session.set_chats(vec![c1, c2]);

        session.set_presence(3, PresenceStatus::Online);
        let online: Vec<_> = session.online_friends().iter().map(|f| f.id).collect();
        assert_eq!(online, [3]);
        assert_eq!(session.total_unread(), 5);
    }

    #[test]
    fn removing_a_friend_drops_their_direct_chat() {
        let mut session = Session::<Instant>::new(viewer());
        session.set_friends(vec![friend(2, "Bo")]);
        let mut direct = chat("d", 1);
        direct.kind = ChatKind::Direct;
        direct.participant = Some(friend(2, "Bo"));
        session.set_chats(vec![direct, chat("g", 2)]);
        session.activate(&ChatId::new("d"));
        session.push_confirmed(message(1, "d", 1));

        assert_eq!(session.remove_friend(2), [ChatId::new("d")]);
        assert!(session.friends().is_empty());
        assert!(session.messages(&ChatId::new("d")).is_empty());
        assert_eq!(session.active_chat(), None);
        assert!(session.chat(&ChatId::new("g")).is_some());
    }
}
