//! Client state machine.
//!
//! The `Client` owns the session snapshot, the realtime channel and the
//! reconciler. Every mutation goes through [`Client::handle`]; readers take
//! an [`Arc`] snapshot that later events never modify in place.

use std::{sync::Arc, time::Duration};

use parley_core::{Channel, ChannelAction, ChannelConfig, ChannelError, Environment};
use parley_proto::{
    ChatId, ChatKind, Message, MessageId, OutboundFrame, PresenceStatus, User, UserId,
};

use crate::{
    dispatcher::{self, InboundHandler},
    error::ClientError,
    event::{ClientAction, ClientEvent, LogLevel, RequestId, RestFailure},
    reconciler::{DeliveryPath, Incoming, Reconciler},
    session::Session,
};

/// Default receiver-side typing expiry.
///
/// Senders stop typing after 3 seconds of inactivity. A dropped stop event
/// would otherwise leave the indicator up forever.
pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_secs(10);

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Realtime channel settings.
    pub channel: ChannelConfig,
    /// Drop typing actors not refreshed within this long. `None` relies on
    /// explicit stop events only.
    pub typing_expiry: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { channel: ChannelConfig::default(), typing_expiry: Some(DEFAULT_TYPING_EXPIRY) }
    }
}

/// Sync engine for one logged-in user.
pub struct Client<E: Environment> {
    /// Environment for wall-clock timestamps.
    env: E,

    config: ClientConfig,

    /// Realtime connection state machine.
    channel: Channel<E::Instant>,

    /// Current snapshot. Replaced copy-on-write when readers hold it.
    session: Arc<Session<E::Instant>>,

    /// Sends between the REST call and their confirmation.
    reconciler: Reconciler,
}

impl<E: Environment> Client<E> {
    /// Create a client for `viewer` with realtime disabled.
    pub fn new(env: E, viewer: User, config: ClientConfig) -> Self {
        let channel = Channel::new(config.channel.clone());
        Self {
            env,
            config,
            channel,
            session: Arc::new(Session::new(viewer)),
            reconciler: Reconciler::new(),
        }
    }

    /// Current session snapshot.
    pub fn session(&self) -> Arc<Session<E::Instant>> {
        Arc::clone(&self.session)
    }

    /// Realtime channel.
    pub fn channel(&self) -> &Channel<E::Instant> {
        &self.channel
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends not yet reconciled.
    pub fn pending_sends(&self) -> usize {
        self.reconciler.pending_count()
    }

    /// Delivery path recorded for a pending send.
    pub fn delivery_path(&self, request_id: RequestId) -> Option<DeliveryPath> {
        self.reconciler.path(request_id)
    }

    /// When the next channel timer fires or a typing indicator goes stale,
    /// if ever. Drivers should deliver a [`ClientEvent::Tick`] no later
    /// than this.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        let typing =
            self.config.typing_expiry.and_then(|ttl| self.session.typing().next_expiry(ttl));
        match (self.channel.next_deadline(), typing) {
            (Some(channel), Some(typing)) => Some(channel.min(typing)),
            (channel, typing) => channel.or(typing),
        }
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `ClientError::EmptyMessage` for blank sends
    /// - `ClientError::ChatNotFound` for sends to or opening an unknown chat
    /// - `ClientError::UnknownRequest` for completions of unknown sends
    /// - `ClientError::Channel` for transport events out of order
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let before = self.channel.state();

        let result = match event {
            ClientEvent::EnableRealtime { now } => Ok(self.handle_enable(now)),
            ClientEvent::DisableRealtime => Ok(self.handle_disable()),
            ClientEvent::TransportOpened { now } => self.handle_opened(now),
            ClientEvent::TransportClosed { reason, now } => {
                Ok(self.handle_transport_failure(ChannelError::Transport(reason), now))
            },
            ClientEvent::TransportError { error, now } => {
                Ok(self.handle_transport_failure(error, now))
            },
            ClientEvent::FrameReceived { raw, now } => Ok(self.handle_frame(&raw, now)),
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
            ClientEvent::SendMessage { chat_id, content } => {
                self.handle_send_message(chat_id, content)
            },
            ClientEvent::MessagePosted { request_id, result } => {
                self.handle_message_posted(request_id, result)
            },
            ClientEvent::SetTyping { chat_id, is_typing } => {
                Ok(self.handle_set_typing(chat_id, is_typing))
            },
            ClientEvent::MarkRead { chat_id, message_id } => {
                Ok(self.handle_mark_read(chat_id, message_id))
            },
            ClientEvent::OpenChat { chat_id } => self.handle_open_chat(chat_id),
            ClientEvent::CloseChat => {
                self.session_mut().deactivate();
                Ok(Vec::new())
            },
            ClientEvent::FriendsLoaded(friends) => {
                self.session_mut().set_friends(friends);
                Ok(Vec::new())
            },
            ClientEvent::GroupsLoaded(groups) => {
                self.session_mut().set_groups(groups);
                Ok(Vec::new())
            },
            ClientEvent::ChatsLoaded(chats) => {
                self.session_mut().set_chats(chats);
                Ok(Vec::new())
            },
            ClientEvent::MessagesLoaded { chat_id, messages } => {
                Ok(self.handle_messages_loaded(chat_id, messages))
            },
            ClientEvent::Unfriended { friend_id } => Ok(self.handle_unfriended(friend_id)),
            ClientEvent::GroupCreated(group) => {
                self.session_mut().add_group(group);
                Ok(vec![ClientAction::FetchChats])
            },
            ClientEvent::Reset => Ok(self.handle_reset()),
        };

        self.sync_channel_state();
        let mut actions = result?;

        let after = self.channel.state();
        if before != after {
            actions.push(ClientAction::ChannelChanged(after));
        }
        Ok(actions)
    }

    fn handle_enable(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let actor_id = self.session.viewer().id;
        let actions = self.channel.enable(actor_id, now);
        self.channel_actions(actions)
    }

    fn handle_disable(&mut self) -> Vec<ClientAction> {
        let was_open = self.channel.can_send();
        let actions = self.channel.disable();
        let mut out = self.channel_actions(actions);
        if was_open {
            out.extend(self.channel_lost());
        }
        out
    }

    fn handle_opened(&mut self, now: E::Instant) -> Result<Vec<ClientAction>, ClientError> {
        let actions = self.channel.handle_opened(now)?;
        let mut out = self.channel_actions(actions);
        out.push(log(LogLevel::Info, "realtime connected"));
        Ok(out)
    }

    fn handle_transport_failure(&mut self, error: ChannelError, now: E::Instant) -> Vec<ClientAction> {
        let was_open = self.channel.can_send();
        let level = if error.is_transient() { LogLevel::Info } else { LogLevel::Warn };
        let message = format!("realtime connection lost: {error}");

        let actions = self.channel.handle_error(error, now);
        if actions.is_empty() && !was_open {
            return Vec::new();
        }

        let mut out = vec![log(level, message)];
        out.extend(self.channel_actions(actions));
        if was_open {
            out.extend(self.channel_lost());
        }
        out
    }

    fn handle_frame(&mut self, raw: &str, now: E::Instant) -> Vec<ClientAction> {
        let event = match dispatcher::decode(raw) {
            Ok(event) => event,
            Err(err) => return vec![log(LogLevel::Warn, format!("dropped inbound frame: {err}"))],
        };

        let mut inbound = Inbound {
            session: Arc::make_mut(&mut self.session),
            reconciler: &mut self.reconciler,
            now,
            actions: Vec::new(),
        };
        dispatcher::dispatch(&mut inbound, event);
        inbound.actions
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let actions = self.channel.tick(now);
        let mut out = self.channel_actions(actions);

        if let Some(ttl) = self.config.typing_expiry
            && self.session.typing().has_expired(now, ttl)
        {
            let expired = self.session_mut().typing_mut().expire(now, ttl);
            out.extend(expired.into_iter().map(|(chat_id, user_id)| {
                log(LogLevel::Debug, format!("typing indicator for {user_id} in {chat_id} expired"))
            }));
        }
        out
    }

    fn handle_send_message(
        &mut self,
        chat_id: ChatId,
        content: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if self.session.chat(&chat_id).is_none() {
            return Err(ClientError::ChatNotFound { chat_id });
        }

        // Decided once, here. Echo handling never looks at live connectivity.
        let path =
            if self.channel.can_send() { DeliveryPath::AwaitEcho } else { DeliveryPath::LocalApply };
        let timestamp = self.env.timestamp();

        let session = Arc::make_mut(&mut self.session);
        let request_id =
            self.reconciler.begin_send(session, chat_id.clone(), content.clone(), path, timestamp);

        Ok(vec![ClientAction::PostMessage { request_id, chat_id, content }])
    }

    fn handle_message_posted(
        &mut self,
        request_id: RequestId,
        result: Result<Message, RestFailure>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let session = Arc::make_mut(&mut self.session);
        match result {
            Ok(message) => {
                let id = message.id;
                let outcome = self.reconciler.complete_send(session, request_id, message)?;
                Ok(vec![log(LogLevel::Debug, format!("message {id} persisted ({outcome:?})"))])
            },
            Err(failure) => match self.reconciler.fail_send(session, request_id)? {
                Some((chat_id, content)) => {
                    Ok(vec![ClientAction::SendFailed { chat_id, content, reason: failure.message }])
                },
                None => Ok(vec![log(
                    LogLevel::Warn,
                    format!("send {request_id} failed after its echo arrived: {failure}"),
                )]),
            },
        }
    }

    fn handle_set_typing(&mut self, chat_id: ChatId, is_typing: bool) -> Vec<ClientAction> {
        let mut out = Vec::new();
        self.send_frame(OutboundFrame::typing(chat_id, is_typing), &mut out);
        out
    }

    fn handle_mark_read(&mut self, chat_id: ChatId, message_id: MessageId) -> Vec<ClientAction> {
        let newest = self.session.newest_confirmed(&chat_id).and_then(|m| m.id) == Some(message_id);
        let open = self.channel.can_send();

        // The cursor moves even when the receipt cannot be sent.
        let session = self.session_mut();
        session.receipts_mut().mark_read(&chat_id, message_id);
        if open && newest {
            session.reset_unread(&chat_id);
        }

        let mut out = Vec::new();
        self.send_frame(OutboundFrame::read(chat_id, message_id), &mut out);
        out
    }

    fn handle_open_chat(&mut self, chat_id: ChatId) -> Result<Vec<ClientAction>, ClientError> {
        if !self.session_mut().activate(&chat_id) {
            return Err(ClientError::ChatNotFound { chat_id });
        }
        Ok(vec![ClientAction::FetchMessages { chat_id }])
    }

    fn handle_messages_loaded(&mut self, chat_id: ChatId, messages: Vec<Message>) -> Vec<ClientAction> {
        let session = Arc::make_mut(&mut self.session);
        self.reconciler.on_history(session, &chat_id, messages);

        let newest = self.session.newest_confirmed(&chat_id).and_then(|m| m.id);
        match newest {
            Some(message_id) if self.session.is_active(&chat_id) && self.channel.can_send() => {
                self.handle_mark_read(chat_id, message_id)
            },
            _ => Vec::new(),
        }
    }

    fn handle_unfriended(&mut self, friend_id: UserId) -> Vec<ClientAction> {
        let removed = self.session_mut().remove_friend(friend_id);
        if removed.is_empty() {
            return Vec::new();
        }
        vec![log(LogLevel::Debug, format!("removed {} chat(s) with {friend_id}", removed.len()))]
    }

    fn handle_reset(&mut self) -> Vec<ClientAction> {
        let actions = self.channel.disable();
        let out = self.channel_actions(actions);

        self.reconciler.clear();
        let viewer = self.session.viewer().clone();
        self.session = Arc::new(Session::new(viewer));
        out
    }

    /// Queue `frame` if the channel is open. Returns whether it was queued.
    ///
    /// Unsent frames are dropped silently: typing notices and read receipts
    /// are best-effort.
    fn send_frame(&self, frame: OutboundFrame, out: &mut Vec<ClientAction>) -> bool {
        if !self.channel.can_send() {
            return false;
        }
        out.push(ClientAction::Send(frame));
        true
    }

    /// The channel left Open. Typing sets go stale without stop events and
    /// pending echoes will never arrive.
    fn channel_lost(&mut self) -> Vec<ClientAction> {
        let session = Arc::make_mut(&mut self.session);
        session.typing_mut().clear();
        let switched = self.reconciler.on_channel_lost(session);

        if switched == 0 {
            return Vec::new();
        }
        vec![log(LogLevel::Debug, format!("{switched} send(s) no longer awaiting an echo"))]
    }

    fn channel_actions(&self, actions: Vec<ChannelAction>) -> Vec<ClientAction> {
        actions
            .into_iter()
            .map(|action| match action {
                ChannelAction::Connect { url } => ClientAction::Connect { url },
                ChannelAction::Disconnect => ClientAction::Disconnect,
                ChannelAction::ReconnectScheduled { attempt, delay } => log(
                    LogLevel::Info,
                    format!(
                        "reconnect {attempt}/{} in {}ms",
                        self.config.channel.max_attempts,
                        delay.as_millis()
                    ),
                ),
                ChannelAction::GaveUp { attempts } => ClientAction::RealtimeUnavailable { attempts },
            })
            .collect()
    }

    fn sync_channel_state(&mut self) {
        let state = self.channel.state();
        let enabled = self.channel.is_enabled();
        if self.session.channel_state() != state || self.session.realtime_enabled() != enabled {
            self.session_mut().set_channel(state, enabled);
        }
    }

    fn session_mut(&mut self) -> &mut Session<E::Instant> {
        Arc::make_mut(&mut self.session)
    }
}

/// Routes decoded frames into the session for one `handle` call.
struct Inbound<'a, I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    session: &'a mut Session<I>,
    reconciler: &'a mut Reconciler,
    now: I,
    actions: Vec<ClientAction>,
}

impl<I> InboundHandler for Inbound<'_, I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    fn on_new_message(&mut self, message: Message) {
        let own = message.sender_id == self.session.viewer().id;
        let notify = if own || self.session.is_active(&message.chat_id) {
            None
        } else {
            Some(notification(self.session, &message))
        };
        let (chat_id, id) = (message.chat_id.clone(), message.id);

        match self.reconciler.on_new_message(self.session, message) {
            Incoming::Duplicate => {
                self.actions.push(log(LogLevel::Debug, format!("duplicate message {id} in {chat_id}")));
            },
            Incoming::ConfirmedOwn | Incoming::Deferred => {},
            Incoming::Appended { known_chat } => {
                if !known_chat {
                    self.actions.push(ClientAction::FetchChats);
                }
                self.actions.extend(notify);
            },
        }
    }

    fn on_presence(&mut self, user_id: UserId, status: PresenceStatus) {
        self.session.set_presence(user_id, status);
    }

    fn on_typing(&mut self, chat_id: ChatId, user_id: UserId, is_typing: bool) {
        if user_id == self.session.viewer().id {
            return;
        }
        self.session.typing_mut().set_typing(&chat_id, user_id, is_typing, self.now);
    }

    fn on_read_receipt(&mut self, chat_id: ChatId, message_id: MessageId) {
        self.session.receipts_mut().record_peer_read(&chat_id, message_id);
    }
}

/// Notification for a message in a conversation that is not open.
///
/// Group conversations are tagged by group name so one notification per
/// group is shown; direct conversations by sender.
fn notification<I>(session: &Session<I>, message: &Message) -> ClientAction
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    let tag = session
        .chat(&message.chat_id)
        .filter(|chat| chat.kind == ChatKind::Group)
        .map_or_else(|| message.sender_name.clone(), |chat| chat.name.clone());

    ClientAction::Notify {
        chat_id: message.chat_id.clone(),
        title: format!("New message from {}", message.sender_name),
        body: message.content.clone(),
        tag,
    }
}

fn log(level: LogLevel, message: impl Into<String>) -> ClientAction {
    ClientAction::Log { level, message: message.into() }
}
