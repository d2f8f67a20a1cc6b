//! Terminal driver for the line client.
//!
//! Implements the [`Driver`] trait for a plain terminal: commands are read
//! line by line from stdin, output is appended to stdout, the realtime
//! channel runs over the WebSocket transport and REST calls go through
//! [`ApiClient`] on spawned tasks.

use std::{
    io::{self, Stdout, Write},
    time::{Duration, Instant},
};

use parley_app::{App, AppEvent, Command, Driver, DriverInput, Effect, RestCall, RestResult};
use parley_client::{
    RestFailure,
    api::ApiClient,
    transport::{self, ConnectedClient, TransportEvent},
};
use parley_proto::NewMessage;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc,
};

use crate::view::View;

/// Longest wait for input when no timer is armed.
const IDLE_WAKE: Duration = Duration::from_secs(1);

/// Finished REST calls waiting to be picked up.
const REST_QUEUE_DEPTH: usize = 64;

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from terminal operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What woke `poll_input`.
enum Polled {
    Line(io::Result<Option<String>>),
    Transport(Option<TransportEvent>),
    Rest(Option<RestResult>),
    Timeout,
}

/// Terminal driver implementing the [`Driver`] trait.
pub struct TerminalDriver {
    lines: Lines<BufReader<Stdin>>,
    stdin_open: bool,
    stdout: Stdout,
    view: View,
    api: ApiClient,
    connection: Option<ConnectedClient>,
    rest_tx: mpsc::Sender<RestResult>,
    rest_rx: mpsc::Receiver<RestResult>,
}

impl TerminalDriver {
    /// Driver using `api` for REST calls. The client must be logged in.
    pub fn new(api: ApiClient) -> Self {
        let (rest_tx, rest_rx) = mpsc::channel(REST_QUEUE_DEPTH);
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdin_open: true,
            stdout: io::stdout(),
            view: View::new(),
            api,
            connection: None,
            rest_tx,
            rest_rx,
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), TerminalError> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut out = self.stdout.lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn line_input(&mut self, line: Option<String>) -> Option<DriverInput<Instant>> {
        let now = self.now();
        let Some(line) = line else {
            // End of input ends the session like /quit.
            self.stdin_open = false;
            return Some(DriverInput::App(AppEvent::Command { command: Command::Quit, now }));
        };
        if line.trim().is_empty() {
            return None;
        }

        let event = match Command::parse(&line) {
            Ok(command) => AppEvent::Command { command, now },
            Err(err) => AppEvent::Error { message: err.to_string() },
        };
        Some(DriverInput::App(event))
    }

    fn spawn_rest(&self, call: RestCall) {
        let api = self.api.clone();
        let results = self.rest_tx.clone();
        tokio::spawn(async move {
            let result = perform(api, call).await;
            // The receiver only goes away at shutdown.
            let _ = results.send(result).await;
        });
    }
}

/// Run one REST call and shape its result for the bridge.
async fn perform(mut api: ApiClient, call: RestCall) -> RestResult {
    match call {
        RestCall::PostMessage { request_id, chat_id, content } => {
            let result = api.post_message(&NewMessage { chat_id, content }).await;
            RestResult::MessagePosted { request_id, result: result.map_err(RestFailure::from) }
        },
        RestCall::FetchMessages { chat_id } => {
            let result = api.messages(&chat_id).await.map_err(RestFailure::from);
            RestResult::MessagesLoaded { chat_id, result }
        },
        RestCall::FetchChats => RestResult::ChatsLoaded(api.chats().await.map_err(Into::into)),
        RestCall::FetchFriends => RestResult::FriendsLoaded(api.friends().await.map_err(Into::into)),
        RestCall::FetchGroups => RestResult::GroupsLoaded(api.groups().await.map_err(Into::into)),
        RestCall::Unfriend { friend_id } => {
            let result = api.unfriend(friend_id).await.map_err(RestFailure::from);
            RestResult::Unfriended { friend_id, result }
        },
        RestCall::CreateGroup(group) => {
            RestResult::GroupCreated(api.create_group(&group).await.map_err(Into::into))
        },
        RestCall::Logout => RestResult::LoggedOut(api.logout().await.map_err(Into::into)),
    }
}

async fn next_transport_event(connection: Option<&mut ConnectedClient>) -> Option<TransportEvent> {
    match connection {
        Some(connection) => connection.from_server.recv().await,
        None => std::future::pending().await,
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn poll_input(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Option<DriverInput<Instant>>, TerminalError> {
        let wait = deadline
            .map_or(IDLE_WAKE, |deadline| deadline.saturating_duration_since(self.now()))
            .min(IDLE_WAKE);

        let polled = tokio::select! {
            line = self.lines.next_line(), if self.stdin_open => Polled::Line(line),
            event = next_transport_event(self.connection.as_mut()) => Polled::Transport(event),
            result = self.rest_rx.recv() => Polled::Rest(result),
            () = tokio::time::sleep(wait) => Polled::Timeout,
        };

        match polled {
            Polled::Line(line) => Ok(self.line_input(line?)),
            Polled::Transport(Some(event)) => Ok(Some(match event {
                TransportEvent::Opened => DriverInput::Opened,
                TransportEvent::Frame(raw) => DriverInput::Frame(raw),
                TransportEvent::Closed(reason) => DriverInput::Closed { reason },
                TransportEvent::Failed(reason) => DriverInput::Failed { reason },
            })),
            Polled::Transport(None) => {
                // Task finished after reporting its final event.
                self.connection = None;
                Ok(None)
            },
            Polled::Rest(result) => Ok(result.map(DriverInput::Rest)),
            Polled::Timeout => Ok(None),
        }
    }

    async fn execute(&mut self, effect: Effect) -> Result<(), TerminalError> {
        match effect {
            Effect::Connect { url } => {
                tracing::info!(%url, "connecting");
                // Replacing the handle aborts any previous connection.
                self.connection = Some(transport::spawn(url));
            },
            Effect::Disconnect => {
                if let Some(connection) = self.connection.take() {
                    connection.stop();
                }
            },
            Effect::Send(frame) => {
                let queued = self.connection.as_ref().is_some_and(|c| c.send(&frame));
                if !queued {
                    tracing::warn!(?frame, "frame not queued");
                }
            },
            Effect::Rest(call) => {
                tracing::debug!(?call, "rest call");
                self.spawn_rest(call);
            },
            Effect::Notify { title, body, tag } => {
                tracing::debug!(%tag, "notification");
                self.write_lines(&[format!("* {title}: {body}")])?;
            },
        }
        Ok(())
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App<Instant>) -> Result<(), TerminalError> {
        let lines = self.view.render(app);
        self.write_lines(&lines)
    }

    fn stop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.stop();
        }
    }
}
