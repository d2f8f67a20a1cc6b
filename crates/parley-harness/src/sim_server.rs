//! In-memory backend for simulations.
//!
//! `SimServer` plays both sides of the external service: it answers REST
//! calls from its own tables and fans real-time frames out to connected
//! users. Nothing is networked; drivers call it directly through a
//! [`SharedServer`] and pull queued frames per user.
//!
//! Failure injection covers the cases the sync engine must survive:
//! refused connections, failing `POST /messages` calls, and held echoes
//! that are delivered only when the test says so.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use parley_client::RestFailure;
use parley_core::Environment;
use parley_proto::{
    Chat, ChatId, ChatKind, Friend, Group, GroupId, InboundFrame, Message, MessageId, NewGroup,
    OutboundFrame, PresenceStatus, ProtocolError, ReadReceipt, TypingUpdate, User, UserId,
    UserStatus,
};

use crate::SimEnv;

/// Server shared by every simulated client.
pub type SharedServer = Arc<Mutex<SimServer>>;

/// Lock a shared server, recovering from a poisoned lock.
pub fn lock(server: &SharedServer) -> MutexGuard<'_, SimServer> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory chat backend.
#[derive(Debug)]
pub struct SimServer {
    env: SimEnv,
    users: BTreeMap<UserId, User>,
    /// Friend pairs, stored as `(smaller, larger)`.
    friendships: BTreeSet<(UserId, UserId)>,
    groups: BTreeMap<GroupId, Group>,
    messages: BTreeMap<ChatId, Vec<Message>>,
    /// Highest message each user has read per conversation.
    cursors: BTreeMap<(ChatId, UserId), MessageId>,
    /// Pending frames for connected users.
    inboxes: BTreeMap<UserId, VecDeque<String>>,
    /// Echoes held back from delivery.
    held: Vec<(UserId, String)>,
    refuse_connections: bool,
    hold_echoes: bool,
    failing_posts: u32,
    next_message_id: MessageId,
    next_group_id: GroupId,
}

impl SimServer {
    /// Empty backend stamping messages from `env`.
    pub fn new(env: SimEnv) -> Self {
        Self {
            env,
            users: BTreeMap::new(),
            friendships: BTreeSet::new(),
            groups: BTreeMap::new(),
            messages: BTreeMap::new(),
            cursors: BTreeMap::new(),
            inboxes: BTreeMap::new(),
            held: Vec::new(),
            refuse_connections: false,
            hold_echoes: false,
            failing_posts: 0,
            next_message_id: 1,
            next_group_id: 1,
        }
    }

    /// Wrap for sharing between drivers.
    pub fn shared(self) -> SharedServer {
        Arc::new(Mutex::new(self))
    }

    /// Register an account.
    pub fn add_user(&mut self, id: UserId, username: &str, full_name: &str) -> User {
        let user = User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: full_name.to_string(),
            status: None,
        };
        self.users.insert(id, user.clone());
        user
    }

    /// Make two accounts friends.
    pub fn befriend(&mut self, a: UserId, b: UserId) {
        self.friendships.insert(pair(a, b));
    }

    /// Id of the direct conversation between two users.
    pub fn direct_chat_id(a: UserId, b: UserId) -> ChatId {
        let (low, high) = pair(a, b);
        ChatId::new(format!("direct-{low}-{high}"))
    }

    /// Id of a group's conversation.
    pub fn group_chat_id(group_id: GroupId) -> ChatId {
        ChatId::new(format!("group-{group_id}"))
    }

    /// Refuse (or accept again) new real-time connections.
    pub fn set_refuse_connections(&mut self, refuse: bool) {
        self.refuse_connections = refuse;
    }

    /// Fail the next `n` `POST /messages` calls with HTTP 500.
    pub fn fail_next_posts(&mut self, n: u32) {
        self.failing_posts = n;
    }

    /// Hold echoes of new messages until [`Self::release_echoes`].
    pub fn set_hold_echoes(&mut self, hold: bool) {
        self.hold_echoes = hold;
    }

    /// Deliver held echoes to users still connected.
    pub fn release_echoes(&mut self) -> usize {
        let held = std::mem::take(&mut self.held);
        let mut delivered = 0;
        for (user_id, raw) in held {
            if let Some(inbox) = self.inboxes.get_mut(&user_id) {
                inbox.push_back(raw);
                delivered += 1;
            }
        }
        delivered
    }

    /// Open a real-time connection. Returns `false` if refused.
    pub fn connect(&mut self, user_id: UserId) -> bool {
        if self.refuse_connections || !self.users.contains_key(&user_id) {
            return false;
        }
        if self.inboxes.insert(user_id, VecDeque::new()).is_none() {
            self.announce_presence(user_id, PresenceStatus::Online);
        }
        true
    }

    /// Close a user's real-time connection and drop its queued frames.
    pub fn disconnect(&mut self, user_id: UserId) {
        if self.inboxes.remove(&user_id).is_some() {
            self.announce_presence(user_id, PresenceStatus::Offline);
        }
    }

    /// Whether `user_id` has a real-time connection.
    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.inboxes.contains_key(&user_id)
    }

    /// Next queued frame for a connected user.
    pub fn pop_frame(&mut self, user_id: UserId) -> Option<String> {
        self.inboxes.get_mut(&user_id)?.pop_front()
    }

    /// Whether a connected user has frames waiting.
    pub fn has_frames(&self, user_id: UserId) -> bool {
        self.inboxes.get(&user_id).is_some_and(|inbox| !inbox.is_empty())
    }

    /// Queue a frame for a connected user. Returns `false` if not connected.
    pub fn push_frame(&mut self, user_id: UserId, frame: &InboundFrame) -> bool {
        let Ok(raw) = frame.encode() else {
            return false;
        };
        self.push_raw(user_id, raw)
    }

    /// Queue raw text for a connected user, valid or not.
    pub fn push_raw(&mut self, user_id: UserId, raw: String) -> bool {
        match self.inboxes.get_mut(&user_id) {
            Some(inbox) => {
                inbox.push_back(raw);
                true
            },
            None => false,
        }
    }

    /// Handle a frame sent by `from`.
    ///
    /// Typing notices and read receipts are relayed to the other members of
    /// the conversation.
    pub fn receive(&mut self, from: UserId, raw: &str) -> Result<(), ProtocolError> {
        match OutboundFrame::decode(raw)? {
            OutboundFrame::Typing(notice) => {
                let frame = InboundFrame::Typing(TypingUpdate {
                    chat_id: notice.chat_id.clone(),
                    user_id: from,
                    is_typing: notice.is_typing,
                });
                self.relay(&notice.chat_id, from, &frame);
            },
            OutboundFrame::MessageRead(receipt) => {
                let cursor = self.cursors.entry((receipt.chat_id.clone(), from)).or_default();
                *cursor = (*cursor).max(receipt.message_id);
                let frame = InboundFrame::MessageRead(ReadReceipt {
                    chat_id: receipt.chat_id.clone(),
                    message_id: receipt.message_id,
                });
                self.relay(&receipt.chat_id, from, &frame);
            },
        }
        Ok(())
    }

    /// `GET /friends`.
    pub fn friends(&self, user_id: UserId) -> Vec<Friend> {
        self.friend_ids(user_id).filter_map(|id| self.friend(id)).collect()
    }

    /// `GET /groups`.
    pub fn groups(&self, user_id: UserId) -> Vec<Group> {
        self.groups.values().filter(|g| g.members.contains(&user_id)).cloned().collect()
    }

    /// `GET /chats`: one entry per friend and per group, newest first.
    pub fn chats(&self, user_id: UserId) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self
            .friend_ids(user_id)
            .filter_map(|id| self.friend(id))
            .map(|friend| {
                let chat_id = Self::direct_chat_id(user_id, friend.id);
                let name = friend.full_name.clone();
                self.summary(user_id, chat_id, ChatKind::Direct, name, Some(friend), None)
            })
            .collect();

        for group in self.groups(user_id) {
            let chat_id = Self::group_chat_id(group.id);
            let name = group.name.clone();
            chats.push(self.summary(user_id, chat_id, ChatKind::Group, name, None, Some(group)));
        }

        chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        chats
    }

    /// `GET /chats/{id}/messages`.
    pub fn messages(&self, user_id: UserId, chat_id: &ChatId) -> Result<Vec<Message>, RestFailure> {
        self.check_member(user_id, chat_id)?;
        Ok(self.messages.get(chat_id).cloned().unwrap_or_default())
    }

    /// `POST /messages`. Echoes the stored message to every connected
    /// member, the sender included.
    pub fn post_message(
        &mut self,
        user_id: UserId,
        chat_id: &ChatId,
        content: &str,
    ) -> Result<Message, RestFailure> {
        if self.failing_posts > 0 {
            self.failing_posts -= 1;
            return Err(failure(500, "Internal server error"));
        }
        self.check_member(user_id, chat_id)?;
        if content.trim().is_empty() {
            return Err(failure(400, "Message content is required"));
        }

        let sender_name = self.users.get(&user_id).map(|u| u.full_name.clone()).unwrap_or_default();
        let message = Message {
            id: self.next_message_id,
            chat_id: chat_id.clone(),
            sender_id: user_id,
            sender_name,
            content: content.to_string(),
            timestamp: self.env.timestamp(),
        };
        self.next_message_id += 1;
        self.messages.entry(chat_id.clone()).or_default().push(message.clone());

        let frame = InboundFrame::NewMessage(message.clone());
        if let Ok(raw) = frame.encode() {
            for member in self.members(chat_id) {
                if !self.inboxes.contains_key(&member) {
                    continue;
                }
                if self.hold_echoes {
                    self.held.push((member, raw.clone()));
                } else {
                    self.push_raw(member, raw.clone());
                }
            }
        }
        Ok(message)
    }

    /// `POST /groups`. The creator is always a member.
    pub fn create_group(&mut self, user_id: UserId, request: &NewGroup) -> Result<Group, RestFailure> {
        if request.name.trim().is_empty() {
            return Err(failure(400, "Group name is required"));
        }
        let mut members = vec![user_id];
        members.extend(request.members.iter().copied().filter(|m| *m != user_id));

        let group = Group {
            id: self.next_group_id,
            name: request.name.trim().to_string(),
            members,
            created_by: user_id,
        };
        self.next_group_id += 1;
        self.groups.insert(group.id, group.clone());
        Ok(group)
    }

    /// `DELETE /friends/{id}/unfriend`.
    pub fn unfriend(&mut self, user_id: UserId, friend_id: UserId) -> Result<(), RestFailure> {
        if self.friendships.remove(&pair(user_id, friend_id)) {
            Ok(())
        } else {
            Err(failure(404, "Friend not found"))
        }
    }

    /// Members of a conversation.
    pub fn members(&self, chat_id: &ChatId) -> Vec<UserId> {
        if let Some(group) = self.groups.values().find(|g| Self::group_chat_id(g.id) == *chat_id) {
            return group.members.clone();
        }
        self.friendships
            .iter()
            .find(|(a, b)| Self::direct_chat_id(*a, *b) == *chat_id)
            .map(|(a, b)| vec![*a, *b])
            .unwrap_or_default()
    }

    /// Every stored message of a conversation.
    pub fn stored(&self, chat_id: &ChatId) -> &[Message] {
        self.messages.get(chat_id).map_or(&[], Vec::as_slice)
    }

    fn relay(&mut self, chat_id: &ChatId, from: UserId, frame: &InboundFrame) {
        for member in self.members(chat_id) {
            if member != from {
                self.push_frame(member, frame);
            }
        }
    }

    fn announce_presence(&mut self, user_id: UserId, status: PresenceStatus) {
        let frame = InboundFrame::UserStatus(UserStatus { user_id, status });
        let friends: Vec<UserId> = self.friend_ids(user_id).collect();
        for friend in friends {
            self.push_frame(friend, &frame);
        }
    }

    fn friend_ids(&self, user_id: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.friendships.iter().filter_map(move |&(a, b)| match (a == user_id, b == user_id) {
            (true, _) => Some(b),
            (_, true) => Some(a),
            _ => None,
        })
    }

    fn friend(&self, id: UserId) -> Option<Friend> {
        let user = self.users.get(&id)?;
        let status =
            if self.is_connected(id) { PresenceStatus::Online } else { PresenceStatus::Offline };
        Some(Friend {
            id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            status,
        })
    }

    fn summary(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        kind: ChatKind,
        name: String,
        participant: Option<Friend>,
        group: Option<Group>,
    ) -> Chat {
        let stored = self.stored(&chat_id);
        let cursor = self.cursors.get(&(chat_id.clone(), user_id)).copied().unwrap_or(0);
        let unread = stored.iter().filter(|m| m.id > cursor && m.sender_id != user_id).count();

        Chat {
            kind,
            name,
            participant,
            group,
            last_message: stored.last().map(|m| m.content.clone()).unwrap_or_default(),
            timestamp: stored.last().map_or_else(|| self.env.timestamp(), |m| m.timestamp),
            unread_count: u32::try_from(unread).unwrap_or(u32::MAX),
            id: chat_id,
        }
    }

    fn check_member(&self, user_id: UserId, chat_id: &ChatId) -> Result<(), RestFailure> {
        if self.members(chat_id).contains(&user_id) {
            Ok(())
        } else {
            Err(failure(403, "Not a member of this chat"))
        }
    }
}

fn pair(a: UserId, b: UserId) -> (UserId, UserId) {
    (a.min(b), a.max(b))
}

fn failure(status: u16, message: &str) -> RestFailure {
    RestFailure { status: Some(status), message: message.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> SimServer {
        let mut server = SimServer::new(SimEnv::new());
        server.add_user(1, "ada", "Ada");
        server.add_user(2, "bob", "Bob");
        server.befriend(1, 2);
        server
    }

    #[test]
    fn post_echoes_to_connected_members_only() {
        let mut server = server();
        let chat = SimServer::direct_chat_id(1, 2);
        assert!(server.connect(1));

        let message = server.post_message(1, &chat, "hi").unwrap();

        let echo = server.pop_frame(1).unwrap();
        assert_eq!(InboundFrame::decode(&echo).unwrap(), InboundFrame::NewMessage(message));
        assert!(server.pop_frame(2).is_none());
    }

    #[test]
    fn connect_announces_presence_to_friends() {
        let mut server = server();
        server.connect(2);
        server.connect(1);

        let frame = InboundFrame::decode(&server.pop_frame(2).unwrap()).unwrap();
        assert_eq!(
            frame,
            InboundFrame::UserStatus(UserStatus { user_id: 1, status: PresenceStatus::Online })
        );
        assert_eq!(server.friends(2)[0].status, PresenceStatus::Online);
    }

    #[test]
    fn held_echoes_wait_for_release() {
        let mut server = server();
        let chat = SimServer::direct_chat_id(1, 2);
        server.connect(1);
        server.set_hold_echoes(true);

        server.post_message(1, &chat, "later").unwrap();
        assert!(server.pop_frame(1).is_none());

        assert_eq!(server.release_echoes(), 1);
        assert!(server.pop_frame(1).is_some());
    }

    #[test]
    fn unread_counts_messages_after_the_cursor() {
        let mut server = server();
        let chat = SimServer::direct_chat_id(1, 2);
        let first = server.post_message(2, &chat, "one").unwrap();
        server.post_message(2, &chat, "two").unwrap();

        server.connect(1);
        let receipt = OutboundFrame::read(chat.clone(), first.id).encode().unwrap();
        server.receive(1, &receipt).unwrap();

        let chats = server.chats(1);
        assert_eq!(chats[0].unread_count, 1);
        assert_eq!(chats[0].last_message, "two");
    }

    #[test]
    fn failing_posts_are_consumed() {
        let mut server = server();
        let chat = SimServer::direct_chat_id(1, 2);
        server.fail_next_posts(1);

        assert_eq!(server.post_message(1, &chat, "x").unwrap_err().status, Some(500));
        assert!(server.post_message(1, &chat, "x").is_ok());
    }

    #[test]
    fn outsiders_cannot_read_history() {
        let mut server = server();
        server.add_user(3, "eve", "Eve");
        let chat = SimServer::direct_chat_id(1, 2);

        assert_eq!(server.messages(3, &chat).unwrap_err().status, Some(403));
    }

    #[test]
    fn group_creator_is_a_member() {
        let mut server = server();
        let group =
            server.create_group(1, &NewGroup { name: " team ".into(), members: vec![2] }).unwrap();

        assert_eq!(group.name, "team");
        assert_eq!(server.members(&SimServer::group_chat_id(group.id)), vec![1, 2]);
        assert_eq!(server.chats(2).len(), 2);
    }
}
