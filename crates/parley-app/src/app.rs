//! Application state machine.
//!
//! The [`App`] holds what only the UI cares about (draft text, search
//! filter, status line, notifications) and renders everything else from
//! the latest client [`Session`] snapshot it was handed. It never mutates
//! the session; changes go out as [`AppAction`]s.
//!
//! # Responsibilities
//!
//! - Keys and commands: composing, sending, navigating between chats.
//! - Sender-side typing notices via the [`Composer`].
//! - Search filtering over chats and friends.
//! - Status line for errors, failed sends and realtime outages.

use std::{
    ops::{Add, Sub},
    sync::Arc,
    time::Duration,
};

use parley_client::{Session, TypingLabel};
use parley_proto::{Chat, ChatId, Friend, Group, User, UserId};

use crate::{AppAction, AppEvent, Command, Composer, KeyInput};

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Conversation it is about.
    pub chat_id: ChatId,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Replacement key.
    pub tag: String,
}

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies, fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App<I> {
    /// Latest snapshot from the client.
    session: Arc<Session<I>>,
    /// Draft and typing timer.
    composer: Composer<I>,
    /// Conversation the current typing burst was announced in.
    typing_chat: Option<ChatId>,
    /// Lowercased search filter. Empty shows everything.
    search: String,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
    /// At most one notification per tag, oldest first.
    notifications: Vec<Notification>,
}

impl<I> App<I>
where
    I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Create an App for `viewer` with an empty session.
    pub fn new(viewer: User) -> Self {
        Self {
            session: Arc::new(Session::new(viewer)),
            composer: Composer::new(),
            typing_chat: None,
            search: String::new(),
            status_message: None,
            notifications: Vec::new(),
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent<I>) -> Vec<AppAction> {
        match event {
            AppEvent::Key { input, now } => self.handle_key(input, now),
            AppEvent::Command { command, .. } => self.handle_command(command),
            AppEvent::Tick { now } => {
                let transition = self.composer.tick(now);
                self.typing_actions(transition)
            },
            AppEvent::SessionUpdated(session) => self.handle_session(session),
            AppEvent::ChannelChanged(_) => vec![AppAction::Render],
            AppEvent::Notification { chat_id, title, body, tag } => {
                self.notifications.retain(|n| n.tag != tag);
                self.notifications.push(Notification {
                    chat_id,
                    title: title.clone(),
                    body: body.clone(),
                    tag: tag.clone(),
                });
                vec![AppAction::Notify { title, body, tag }, AppAction::Render]
            },
            AppEvent::SendFailed { chat_id, content, reason } => {
                if self.session.active_chat() == Some(&chat_id) {
                    self.composer.restore(content);
                }
                self.status_message = Some(format!("Message not sent: {reason}"));
                vec![AppAction::Render]
            },
            AppEvent::RealtimeUnavailable { attempts } => {
                self.status_message = Some(format!(
                    "Realtime unavailable after {attempts} attempts; messages still send"
                ));
                vec![AppAction::Render]
            },
            AppEvent::LoggedOut => {
                self.status_message = Some("Logged out".to_string());
                vec![AppAction::Render, AppAction::Quit]
            },
            AppEvent::Error { message } => {
                self.status_message = Some(format!("Error: {message}"));
                vec![AppAction::Render]
            },
        }
    }

    /// Set a status message to display to the user.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Open a conversation, ending any typing burst in the current one.
    pub fn open_chat(&mut self, chat_id: ChatId) -> Vec<AppAction> {
        let mut actions = self.leave_composer();
        self.notifications.retain(|n| n.chat_id != chat_id);
        actions.push(AppAction::OpenChat { chat_id });
        actions.push(AppAction::Render);
        actions
    }

    /// Close the open conversation.
    pub fn close_chat(&mut self) -> Vec<AppAction> {
        let mut actions = self.leave_composer();
        actions.push(AppAction::CloseChat);
        actions.push(AppAction::Render);
        actions
    }

    /// Send the draft to the open conversation.
    pub fn submit(&mut self) -> Vec<AppAction> {
        let Some(chat_id) = self.session.active_chat().cloned() else {
            self.status_message = Some("Open a chat first".to_string());
            return vec![AppAction::Render];
        };
        let Some((content, ended)) = self.composer.take() else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        if ended {
            actions.extend(self.stop_typing_notice());
        }
        actions.push(AppAction::SendMessage { chat_id, content });
        actions.push(AppAction::Render);
        actions
    }

    /// Latest session snapshot.
    pub fn session(&self) -> &Session<I> {
        &self.session
    }

    /// Current draft.
    pub fn draft(&self) -> &str {
        self.composer.draft()
    }

    /// Composer state.
    pub fn composer(&self) -> &Composer<I> {
        &self.composer
    }

    /// When the composer's idle timer fires, if armed.
    pub fn next_deadline(&self) -> Option<I> {
        self.composer.deadline()
    }

    /// Current status message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Current search filter.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Notifications on screen.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Open conversation.
    pub fn active_chat(&self) -> Option<&Chat> {
        self.session.active_chat().and_then(|id| self.session.chat(id))
    }

    /// Conversations matching the search filter, newest first.
    pub fn visible_chats(&self) -> Vec<&Chat> {
        self.session
            .chats()
            .iter()
            .filter(|c| matches_search(&self.search, &[&c.name, &c.last_message]))
            .collect()
    }

    /// Friends matching the search filter.
    pub fn visible_friends(&self) -> Vec<&Friend> {
        self.session
            .friends()
            .iter()
            .filter(|f| matches_search(&self.search, &[&f.username, &f.full_name]))
            .collect()
    }

    /// Groups matching the search filter.
    pub fn visible_groups(&self) -> Vec<&Group> {
        self.session.groups().iter().filter(|g| matches_search(&self.search, &[&g.name])).collect()
    }

    /// Realtime indicator text.
    pub fn connection_label(&self) -> &'static str {
        self.session.connection_status().as_str()
    }

    /// Who is typing in the open conversation.
    pub fn typing_label(&self) -> TypingLabel {
        self.session.active_chat().map_or(TypingLabel::None, |id| self.session.typing().label(id))
    }

    /// Shown next to the composer while the viewer's own burst lasts.
    pub fn own_typing_label(&self) -> Option<&'static str> {
        self.composer.is_typing().then_some("You are typing...")
    }

    fn handle_key(&mut self, input: KeyInput, now: I) -> Vec<AppAction> {
        match input {
            KeyInput::Char(c) => {
                let transition = self.composer.insert(c, now);
                let mut actions = self.typing_actions(transition);
                actions.push(AppAction::Render);
                actions
            },
            KeyInput::Backspace => {
                let transition = self.composer.backspace(now);
                let mut actions = self.typing_actions(transition);
                actions.push(AppAction::Render);
                actions
            },
            KeyInput::Enter => self.submit(),
            KeyInput::Tab => match self.next_chat() {
                Some(chat_id) => self.open_chat(chat_id),
                None => Vec::new(),
            },
            KeyInput::Esc => {
                if self.session.active_chat().is_some() {
                    self.close_chat()
                } else {
                    vec![AppAction::Quit]
                }
            },
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<AppAction> {
        match command {
            // A whole line goes out at once, without a typing burst.
            Command::Say(text) => match self.session.active_chat().cloned() {
                Some(_) if text.trim().is_empty() => Vec::new(),
                Some(chat_id) => {
                    vec![AppAction::SendMessage { chat_id, content: text }, AppAction::Render]
                },
                None => self.status("Open a chat first".to_string()),
            },
            Command::Open(target) => match self.find_chat(&target) {
                Some(chat_id) => self.open_chat(chat_id),
                None => self.status(format!("No chat matches '{target}'")),
            },
            Command::Close => self.close_chat(),
            Command::Search(query) => {
                self.search = query.trim().to_lowercase();
                vec![AppAction::Render]
            },
            Command::Unfriend(target) => match self.find_friend(&target) {
                Some(friend_id) => vec![AppAction::Unfriend { friend_id }],
                None => self.status(format!("No friend matches '{target}'")),
            },
            Command::Group { name, members } => {
                let mut ids = Vec::with_capacity(members.len());
                for member in &members {
                    match self.find_friend(member) {
                        Some(id) => ids.push(id),
                        None => return self.status(format!("No friend matches '{member}'")),
                    }
                }
                self.status_message = Some(format!("Creating group {name}..."));
                vec![AppAction::CreateGroup { name, members: ids }, AppAction::Render]
            },
            Command::Refresh => vec![AppAction::Refresh],
            Command::Realtime(true) => vec![AppAction::EnableRealtime],
            Command::Realtime(false) => vec![AppAction::DisableRealtime],
            Command::Logout => {
                let mut actions = self.leave_composer();
                actions.push(AppAction::Logout);
                actions
            },
            Command::Quit => {
                let mut actions = self.leave_composer();
                actions.push(AppAction::Quit);
                actions
            },
        }
    }

    fn handle_session(&mut self, session: Arc<Session<I>>) -> Vec<AppAction> {
        let mut actions = Vec::new();
        let left = self.typing_chat.as_ref().is_some_and(|chat| session.active_chat() != Some(chat));
        if left && self.composer.teardown() {
            actions.extend(self.stop_typing_notice());
        }
        self.session = session;
        actions.push(AppAction::Render);
        actions
    }

    /// Turn a composer transition into a typing notice for the open chat.
    fn typing_actions(&mut self, transition: Option<bool>) -> Vec<AppAction> {
        match transition {
            Some(true) => match self.session.active_chat().cloned() {
                Some(chat_id) => {
                    self.typing_chat = Some(chat_id.clone());
                    vec![AppAction::SetTyping { chat_id, is_typing: true }]
                },
                None => Vec::new(),
            },
            Some(false) => self.stop_typing_notice().into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn stop_typing_notice(&mut self) -> Option<AppAction> {
        self.typing_chat.take().map(|chat_id| AppAction::SetTyping { chat_id, is_typing: false })
    }

    fn leave_composer(&mut self) -> Vec<AppAction> {
        if self.composer.teardown() {
            self.stop_typing_notice().into_iter().collect()
        } else {
            self.typing_chat = None;
            Vec::new()
        }
    }

    fn next_chat(&self) -> Option<ChatId> {
        let chats = self.visible_chats();
        let current = self.session.active_chat();
        let pos = current.and_then(|id| chats.iter().position(|c| &c.id == id));
        let next = pos.map_or(0, |p| (p + 1) % chats.len().max(1));
        chats.get(next).map(|c| c.id.clone())
    }

    /// Exact chat id or name first, then a friend's direct chat, then a
    /// group's chat, then any chat whose name contains the target.
    fn find_chat(&self, target: &str) -> Option<ChatId> {
        let session = &self.session;
        let chats = session.chats();
        let needle = target.to_lowercase();
        chats
            .iter()
            .find(|c| c.id.as_str() == target || c.name.to_lowercase() == needle)
            .or_else(|| self.find_friend(target).and_then(|id| session.direct_chat_with(id)))
            .or_else(|| {
                session
                    .groups()
                    .iter()
                    .find(|g| g.name.to_lowercase() == needle)
                    .and_then(|g| session.group_chat(g.id))
            })
            .or_else(|| chats.iter().find(|c| c.name.to_lowercase().contains(&needle)))
            .map(|c| c.id.clone())
    }

    fn find_friend(&self, target: &str) -> Option<UserId> {
        let needle = target.to_lowercase();
        let by_id = target.parse::<UserId>().ok();
        self.session
            .friends()
            .iter()
            .find(|f| {
                Some(f.id) == by_id
                    || f.username.to_lowercase() == needle
                    || f.full_name.to_lowercase() == needle
            })
            .map(|f| f.id)
    }

    fn status(&mut self, message: String) -> Vec<AppAction> {
        self.status_message = Some(message);
        vec![AppAction::Render]
    }
}

fn matches_search(search: &str, fields: &[&str]) -> bool {
    search.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(search))
}
