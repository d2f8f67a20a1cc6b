//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI driver but executes
//! every effect against a [`SharedServer`] in-process. It implements
//! [`Driver`] so the same [`parley_app::Runtime`] orchestration code runs in
//! both production and simulation.
//!
//! Inputs are queued and handed out one per `poll_input`. Whether a queued
//! REST result or a pending server frame goes first is switchable, which is
//! how tests put an echo ahead of its `POST /messages` response.

use std::{
    collections::{BTreeMap, VecDeque},
    convert::Infallible,
};

use parley_app::{
    App, AppEvent, Command, Driver, DriverInput, Effect, KeyInput, RestCall, RestResult,
};
use parley_core::Environment;
use parley_proto::{ChatId, MessageId, OutboundFrame, UserId};

use crate::{
    SharedServer, SimEnv, SimInstant,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    sim_server::lock,
};

/// A notification the App asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shown {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Replacement key.
    pub tag: String,
}

/// Simulation driver for one user.
pub struct SimDriver {
    env: SimEnv,
    server: SharedServer,
    user_id: UserId,
    inputs: VecDeque<DriverInput<SimInstant>>,
    connected: bool,
    frames_first: bool,
    auto_advance: bool,
    renders: usize,
    shown: Vec<Shown>,
    sent: Vec<OutboundFrame>,
    calls: Vec<RestCall>,
    cursor_history: BTreeMap<ChatId, Vec<MessageId>>,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Driver for `user_id` against `server`.
    pub fn new(env: SimEnv, server: SharedServer, user_id: UserId) -> Self {
        Self {
            env,
            server,
            user_id,
            inputs: VecDeque::new(),
            connected: false,
            frames_first: false,
            auto_advance: false,
            renders: 0,
            shown: Vec::new(),
            sent: Vec::new(),
            calls: Vec::new(),
            cursor_history: BTreeMap::new(),
            invariants: None,
        }
    }

    /// Check invariants on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Deliver pending server frames before queued inputs.
    pub fn set_frames_first(&mut self, frames_first: bool) {
        self.frames_first = frames_first;
    }

    /// When idle, jump the clock to the next timer deadline.
    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        self.auto_advance = auto_advance;
    }

    /// Queue an input.
    pub fn inject(&mut self, input: DriverInput<SimInstant>) {
        self.inputs.push_back(input);
    }

    /// Queue a key press at the current time.
    pub fn key(&mut self, input: KeyInput) {
        let now = self.env.now();
        self.inject(DriverInput::App(AppEvent::Key { input, now }));
    }

    /// Queue a command at the current time.
    pub fn command(&mut self, command: Command) {
        let now = self.env.now();
        self.inject(DriverInput::App(AppEvent::Command { command, now }));
    }

    /// Break the WebSocket from the server side.
    pub fn drop_connection(&mut self, reason: &str) {
        if !self.connected {
            return;
        }
        lock(&self.server).disconnect(self.user_id);
        self.connected = false;
        self.inject(DriverInput::Closed { reason: reason.to_string() });
    }

    /// Whether the simulated WebSocket is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether nothing is waiting to be delivered.
    pub fn is_idle(&self) -> bool {
        if !self.inputs.is_empty() {
            return false;
        }
        !self.connected || !lock(&self.server).has_frames(self.user_id)
    }

    /// Number of renders so far.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Notifications shown so far.
    pub fn shown(&self) -> &[Shown] {
        &self.shown
    }

    /// Frames sent so far.
    pub fn sent(&self) -> &[OutboundFrame] {
        &self.sent
    }

    /// REST calls made so far.
    pub fn calls(&self) -> &[RestCall] {
        &self.calls
    }

    /// Snapshot of the App's session, with cursor history accumulated over
    /// every snapshot this driver has taken.
    pub fn snapshot(&mut self, app: &App<SimInstant>) -> ClientSnapshot {
        let mut snapshot = ClientSnapshot::from_session(app.session());
        for (chat_id, cursors) in &snapshot.cursor_history {
            let history = self.cursor_history.entry(chat_id.clone()).or_default();
            for cursor in cursors {
                if history.last() != Some(cursor) {
                    history.push(*cursor);
                }
            }
        }
        snapshot.cursor_history.clone_from(&self.cursor_history);
        snapshot
    }

    fn next_frame(&mut self) -> Option<DriverInput<SimInstant>> {
        if !self.connected {
            return None;
        }
        lock(&self.server).pop_frame(self.user_id).map(DriverInput::Frame)
    }

    fn rest(&mut self, call: RestCall) -> RestResult {
        self.calls.push(call.clone());
        let user = self.user_id;
        let mut server = lock(&self.server);

        match call {
            RestCall::PostMessage { request_id, chat_id, content } => RestResult::MessagePosted {
                request_id,
                result: server.post_message(user, &chat_id, &content),
            },
            RestCall::FetchMessages { chat_id } => {
                let result = server.messages(user, &chat_id);
                RestResult::MessagesLoaded { chat_id, result }
            },
            RestCall::FetchChats => RestResult::ChatsLoaded(Ok(server.chats(user))),
            RestCall::FetchFriends => RestResult::FriendsLoaded(Ok(server.friends(user))),
            RestCall::FetchGroups => RestResult::GroupsLoaded(Ok(server.groups(user))),
            RestCall::Unfriend { friend_id } => {
                RestResult::Unfriended { friend_id, result: server.unfriend(user, friend_id) }
            },
            RestCall::CreateGroup(group) => {
                RestResult::GroupCreated(server.create_group(user, &group))
            },
            RestCall::Logout => {
                server.disconnect(user);
                RestResult::LoggedOut(Ok(()))
            },
        }
    }
}

impl Driver for SimDriver {
    type Error = Infallible;
    type Instant = SimInstant;

    async fn poll_input(
        &mut self,
        deadline: Option<SimInstant>,
    ) -> Result<Option<DriverInput<SimInstant>>, Infallible> {
        let input = if self.frames_first {
            self.next_frame().or_else(|| self.inputs.pop_front())
        } else {
            self.inputs.pop_front().or_else(|| self.next_frame())
        };

        if input.is_none()
            && self.auto_advance
            && let Some(deadline) = deadline
        {
            let now = self.env.now();
            if deadline > now {
                self.env.advance(deadline - now);
            }
        }
        Ok(input)
    }

    async fn execute(&mut self, effect: Effect) -> Result<(), Infallible> {
        match effect {
            Effect::Connect { url } => {
                tracing::debug!(%url, user = self.user_id, "sim connect");
                if lock(&self.server).connect(self.user_id) {
                    self.connected = true;
                    self.inject(DriverInput::Opened);
                } else {
                    self.inject(DriverInput::Failed { reason: "connection refused".to_string() });
                }
            },
            Effect::Disconnect => {
                lock(&self.server).disconnect(self.user_id);
                self.connected = false;
            },
            Effect::Send(frame) => {
                if self.connected {
                    let delivered = frame
                        .encode()
                        .and_then(|raw| lock(&self.server).receive(self.user_id, &raw));
                    if let Err(error) = delivered {
                        tracing::warn!(%error, "sim server rejected frame");
                    }
                }
                self.sent.push(frame);
            },
            Effect::Rest(call) => {
                let result = self.rest(call);
                self.inject(DriverInput::Rest(result));
            },
            Effect::Notify { title, body, tag } => self.shown.push(Shown { title, body, tag }),
        }
        Ok(())
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn render(&mut self, app: &App<SimInstant>) -> Result<(), Infallible> {
        self.renders += 1;
        if self.invariants.is_some() {
            let snapshot = SystemSnapshot::single(self.snapshot(app));
            if let Some(registry) = &self.invariants {
                registry.assert_all(&snapshot, &format!("after render {}", self.renders));
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        lock(&self.server).disconnect(self.user_id);
        self.connected = false;
    }
}
