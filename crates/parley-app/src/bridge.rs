//! Protocol-to-Application translation layer.
//!
//! The [`Bridge`] wraps the [`parley_client::Client`] and adapts it to the
//! application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`]s into client events or REST calls.
//! - Accumulates outgoing [`Effect`]s for the driver to execute in the next
//!   I/O cycle.
//! - Feeds transport events and REST results back into the client.
//! - Publishes a new session snapshot to the App whenever the client
//!   replaced it, and turns client actions into [`crate::AppEvent`]s.
//! - Logs the client's diagnostics through `tracing`.

use std::sync::Arc;

use parley_client::{
    Client, ClientAction, ClientConfig, ClientError, ClientEvent, LogLevel, RestFailure, Session,
};
use parley_core::{ChannelError, Environment};
use parley_proto::{NewGroup, User};

use crate::{AppAction, AppEvent, Effect, RestCall, RestResult};

/// Bridge between App and Client protocol logic.
///
/// Generic over Environment to support both production and simulation.
pub struct Bridge<E: Environment> {
    client: Client<E>,
    outgoing: Vec<Effect>,
    /// Snapshot last handed to the App.
    published: Arc<Session<E::Instant>>,
}

impl<E: Environment> Bridge<E> {
    /// Create a bridge for `viewer`.
    pub fn new(env: E, viewer: User, config: ClientConfig) -> Self {
        let client = Client::new(env, viewer, config);
        let published = client.session();
        Self { client, outgoing: Vec::new(), published }
    }

    /// Underlying client.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Current session snapshot.
    pub fn session(&self) -> Arc<Session<E::Instant>> {
        self.client.session()
    }

    /// Earliest client timer deadline.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        self.client.next_deadline()
    }

    /// Load the initial lists and optionally start realtime.
    pub fn start(&mut self, realtime: bool, now: E::Instant) -> Vec<AppEvent<E::Instant>> {
        self.refresh();
        if realtime {
            let result = self.client.handle(ClientEvent::EnableRealtime { now });
            return self.handle_client_result(result);
        }
        Vec::new()
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(
        &mut self,
        action: AppAction,
        now: E::Instant,
    ) -> Vec<AppEvent<E::Instant>> {
        let event = match action {
            AppAction::OpenChat { chat_id } => ClientEvent::OpenChat { chat_id },
            AppAction::CloseChat => ClientEvent::CloseChat,
            AppAction::SendMessage { chat_id, content } => {
                ClientEvent::SendMessage { chat_id, content }
            },
            AppAction::SetTyping { chat_id, is_typing } => {
                ClientEvent::SetTyping { chat_id, is_typing }
            },
            AppAction::EnableRealtime => ClientEvent::EnableRealtime { now },
            AppAction::DisableRealtime => ClientEvent::DisableRealtime,
            AppAction::Unfriend { friend_id } => {
                self.outgoing.push(Effect::Rest(RestCall::Unfriend { friend_id }));
                return Vec::new();
            },
            AppAction::CreateGroup { name, members } => {
                let group = NewGroup { name, members };
                self.outgoing.push(Effect::Rest(RestCall::CreateGroup(group)));
                return Vec::new();
            },
            AppAction::Refresh => {
                self.refresh();
                return Vec::new();
            },
            AppAction::Logout => {
                self.outgoing.push(Effect::Rest(RestCall::Logout));
                return Vec::new();
            },
            AppAction::Render | AppAction::Quit | AppAction::Notify { .. } => return Vec::new(),
        };

        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    /// The WebSocket connected.
    pub fn handle_opened(&mut self, now: E::Instant) -> Vec<AppEvent<E::Instant>> {
        let result = self.client.handle(ClientEvent::TransportOpened { now });
        self.handle_client_result(result)
    }

    /// The WebSocket closed.
    pub fn handle_closed(&mut self, reason: String, now: E::Instant) -> Vec<AppEvent<E::Instant>> {
        let result = self.client.handle(ClientEvent::TransportClosed { reason, now });
        self.handle_client_result(result)
    }

    /// The WebSocket failed to connect or broke.
    pub fn handle_failed(&mut self, reason: String, now: E::Instant) -> Vec<AppEvent<E::Instant>> {
        let error = ChannelError::Transport(reason);
        let result = self.client.handle(ClientEvent::TransportError { error, now });
        self.handle_client_result(result)
    }

    /// Handle a text frame from the server.
    pub fn handle_frame(&mut self, raw: String, now: E::Instant) -> Vec<AppEvent<E::Instant>> {
        let result = self.client.handle(ClientEvent::FrameReceived { raw, now });
        self.handle_client_result(result)
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<AppEvent<E::Instant>> {
        let result = self.client.handle(ClientEvent::Tick { now });
        self.handle_client_result(result)
    }

    /// Feed a finished REST call back in.
    pub fn handle_rest(&mut self, result: RestResult) -> Vec<AppEvent<E::Instant>> {
        if let Some(failure) = unauthorized(&result) {
            tracing::warn!(%failure, "session rejected by the server");
            return self.end_session(Some(failure.message.clone()));
        }

        let event = match result {
            RestResult::MessagePosted { request_id, result } => {
                ClientEvent::MessagePosted { request_id, result }
            },
            RestResult::MessagesLoaded { chat_id, result } => match result {
                Ok(messages) => ClientEvent::MessagesLoaded { chat_id, messages },
                Err(failure) => return failed(&format!("Could not load messages: {failure}")),
            },
            RestResult::ChatsLoaded(result) => match result {
                Ok(chats) => ClientEvent::ChatsLoaded(chats),
                Err(failure) => return failed(&format!("Could not load chats: {failure}")),
            },
            RestResult::FriendsLoaded(result) => match result {
                Ok(friends) => ClientEvent::FriendsLoaded(friends),
                Err(failure) => return failed(&format!("Could not load friends: {failure}")),
            },
            RestResult::GroupsLoaded(result) => match result {
                Ok(groups) => ClientEvent::GroupsLoaded(groups),
                Err(failure) => return failed(&format!("Could not load groups: {failure}")),
            },
            RestResult::Unfriended { friend_id, result } => match result {
                Ok(()) => ClientEvent::Unfriended { friend_id },
                Err(failure) => return failed(&format!("Could not remove friend: {failure}")),
            },
            RestResult::GroupCreated(result) => match result {
                Ok(group) => ClientEvent::GroupCreated(group),
                Err(failure) => return failed(&format!("Could not create group: {failure}")),
            },
            RestResult::LoggedOut(result) => {
                if let Err(failure) = result {
                    tracing::warn!(%failure, "logout request failed; ending session anyway");
                }
                return self.end_session(None);
            },
        };

        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    /// Take pending outgoing effects.
    pub fn take_outgoing(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outgoing)
    }

    fn refresh(&mut self) {
        self.outgoing.push(Effect::Rest(RestCall::FetchFriends));
        self.outgoing.push(Effect::Rest(RestCall::FetchGroups));
        self.outgoing.push(Effect::Rest(RestCall::FetchChats));
    }

    fn end_session(&mut self, reason: Option<String>) -> Vec<AppEvent<E::Instant>> {
        let result = self.client.handle(ClientEvent::Reset);
        let mut events = self.handle_client_result(result);
        if let Some(reason) = reason {
            events.push(AppEvent::Error { message: format!("Session expired: {reason}") });
        }
        events.push(AppEvent::LoggedOut);
        events
    }

    fn handle_client_result(
        &mut self,
        result: Result<Vec<ClientAction>, ClientError>,
    ) -> Vec<AppEvent<E::Instant>> {
        let mut events = Vec::new();

        let session = self.client.session();
        if !Arc::ptr_eq(&session, &self.published) {
            self.published = Arc::clone(&session);
            events.push(AppEvent::SessionUpdated(session));
        }

        match result {
            Ok(actions) => self.process_client_actions(actions, &mut events),
            Err(e) if e.is_user_facing() => events.push(AppEvent::Error { message: e.to_string() }),
            Err(e) => tracing::warn!(error = %e, "client rejected event"),
        }
        events
    }

    fn process_client_actions(
        &mut self,
        actions: Vec<ClientAction>,
        events: &mut Vec<AppEvent<E::Instant>>,
    ) {
        for action in actions {
            match action {
                ClientAction::Connect { url } => self.outgoing.push(Effect::Connect { url }),
                ClientAction::Disconnect => self.outgoing.push(Effect::Disconnect),
                ClientAction::Send(frame) => self.outgoing.push(Effect::Send(frame)),
                ClientAction::PostMessage { request_id, chat_id, content } => {
                    let call = RestCall::PostMessage { request_id, chat_id, content };
                    self.outgoing.push(Effect::Rest(call));
                },
                ClientAction::FetchMessages { chat_id } => {
                    self.outgoing.push(Effect::Rest(RestCall::FetchMessages { chat_id }));
                },
                ClientAction::FetchChats => self.outgoing.push(Effect::Rest(RestCall::FetchChats)),
                ClientAction::SendFailed { chat_id, content, reason } => {
                    events.push(AppEvent::SendFailed { chat_id, content, reason });
                },
                ClientAction::Notify { chat_id, title, body, tag } => {
                    events.push(AppEvent::Notification { chat_id, title, body, tag });
                },
                ClientAction::ChannelChanged(state) => events.push(AppEvent::ChannelChanged(state)),
                ClientAction::RealtimeUnavailable { attempts } => {
                    events.push(AppEvent::RealtimeUnavailable { attempts });
                },
                ClientAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{message}"),
                    LogLevel::Info => tracing::info!("{message}"),
                    LogLevel::Warn => tracing::warn!("{message}"),
                },
            }
        }
    }
}

fn failed<I>(message: &str) -> Vec<AppEvent<I>> {
    vec![AppEvent::Error { message: message.to_string() }]
}

/// A 401 from any endpoint means the token is no longer valid.
fn unauthorized(result: &RestResult) -> Option<&RestFailure> {
    let failure = match result {
        RestResult::MessagePosted { result, .. } => result.as_ref().err(),
        RestResult::MessagesLoaded { result, .. } => result.as_ref().err(),
        RestResult::ChatsLoaded(result) => result.as_ref().err(),
        RestResult::FriendsLoaded(result) => result.as_ref().err(),
        RestResult::GroupsLoaded(result) => result.as_ref().err(),
        RestResult::Unfriended { result, .. } => result.as_ref().err(),
        RestResult::GroupCreated(result) => result.as_ref().err(),
        RestResult::LoggedOut(_) => None,
    };
    failure.filter(|f| f.status == Some(401))
}
