//! Real-time channel state machine.
//!
//! Owns the lifecycle of the single WebSocket connection to the real-time
//! endpoint: connect, connect timeout, close, and capped exponential
//! reconnect. Uses the action pattern: methods take time as input and return
//! actions for the driver to execute, so no I/O happens here.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  enable  ┌────────────┐   opened    ┌──────┐
//! │ Idle │─────────>│ Connecting │────────────>│ Open │
//! └──────┘          └────────────┘             └──────┘
//!    ^                 │      ^                    │
//!    │ disable         │      │ reconnect timer    │ closed / error
//!    │ (any state)     ↓      │                    ↓
//!    │              ┌────────────┐<────────────────┘
//!    └──────────────│   Closed   │
//!                   └────────────┘
//! ```
//!
//! # Invariants
//!
//! - At most `max_attempts` reconnects are scheduled between two opens.
//! - Once attempts are exhausted the channel stays Closed until `enable` is
//!   called again.
//! - `disable` cancels both timers; nothing fires afterwards.
//! - Close and error events that arrive while not Connecting/Open are stale
//!   and ignored.

use std::{
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use crate::{backoff::Backoff, error::ChannelError, timer::Timer};

/// Default real-time endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Base delay of the reconnect schedule.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on a single reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Time allowed for a connect attempt to reach Open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Actions returned by the channel state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open a connection to this URL.
    Connect {
        /// Endpoint with the actor's identity attached
        url: String,
    },

    /// Close the current connection (if any).
    Disconnect,

    /// A reconnect was scheduled.
    ReconnectScheduled {
        /// 1-based attempt number
        attempt: u32,
        /// Wait before the attempt
        delay: Duration,
    },

    /// All reconnect attempts were used. Realtime is down until re-enabled.
    GaveUp {
        /// Attempts made
        attempts: u32,
    },
}

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Not enabled.
    Idle,
    /// Connect issued, waiting for open.
    Connecting,
    /// Connected; frames may be sent.
    Open,
    /// Connection lost or failed. A reconnect may be pending.
    Closed,
}

impl ChannelState {
    /// Whether a connection attempt or connection is live.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Channel configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Real-time endpoint; the actor id is appended as `?userId=`.
    pub endpoint: String,
    /// First reconnect waits `base_delay * 2`.
    pub base_delay: Duration,
    /// Cap on any single reconnect delay.
    pub max_delay: Duration,
    /// Reconnects allowed between two successful opens.
    pub max_attempts: u32,
    /// Connect attempts not open after this long are aborted.
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Channel state machine.
///
/// Pure: no I/O and no environment. Time is passed to the methods that need
/// it. Generic over the instant type so simulations can use virtual time.
#[derive(Debug, Clone)]
pub struct Channel<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    state: ChannelState,
    config: ChannelConfig,
    /// Identity the connection is addressed by. `None` while disabled.
    actor: Option<u64>,
    backoff: Backoff,
    connect_timer: Timer<I>,
    reconnect_timer: Timer<I>,
    connect_started: Option<I>,
    last_error: Option<ChannelError>,
}

impl<I> Channel<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Create a disabled channel.
    pub fn new(config: ChannelConfig) -> Self {
        let backoff = Backoff::new(config.base_delay, config.max_delay, config.max_attempts);
        Self {
            state: ChannelState::Idle,
            config,
            actor: None,
            backoff,
            connect_timer: Timer::new(),
            reconnect_timer: Timer::new(),
            connect_started: None,
            last_error: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Frames may only be sent while Open.
    pub fn can_send(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Whether realtime is wanted (between `enable` and `disable`).
    pub fn is_enabled(&self) -> bool {
        self.actor.is_some()
    }

    /// Reconnect attempts consumed since the last open.
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Most recent failure, cleared on open.
    pub fn last_error(&self) -> Option<&ChannelError> {
        self.last_error.as_ref()
    }

    /// Configuration in use.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Earliest pending timer deadline. Drivers may sleep until then.
    pub fn next_deadline(&self) -> Option<I> {
        match (self.connect_timer.deadline(), self.reconnect_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Connection URL for an actor.
    pub fn url_for(&self, actor_id: u64) -> String {
        format!("{}?userId={actor_id}", self.config.endpoint)
    }

    /// Start connecting on behalf of `actor_id`.
    ///
    /// No-op if already Connecting/Open for the same actor. Otherwise any
    /// live connection is dropped, the reconnect schedule is reset and a new
    /// connect is issued.
    pub fn enable(&mut self, actor_id: u64, now: I) -> Vec<ChannelAction> {
        if self.actor == Some(actor_id) && self.state.is_active() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.state.is_active() {
            actions.push(ChannelAction::Disconnect);
        }

        self.actor = Some(actor_id);
        self.backoff.reset();
        self.reconnect_timer.cancel();
        self.last_error = None;
        actions.push(self.start_connect(actor_id, now));
        actions
    }

    /// Stop realtime: close the connection and cancel every timer.
    pub fn disable(&mut self) -> Vec<ChannelAction> {
        let was_active = self.state.is_active();

        self.actor = None;
        self.state = ChannelState::Idle;
        self.connect_timer.cancel();
        self.reconnect_timer.cancel();
        self.connect_started = None;
        self.backoff.reset();

        if was_active { vec![ChannelAction::Disconnect] } else { Vec::new() }
    }

    /// Transport reports the connection is open.
    ///
    /// # Errors
    ///
    /// - `ChannelError::InvalidState` if no connect is in flight
    pub fn handle_opened(&mut self, _now: I) -> Result<Vec<ChannelAction>, ChannelError> {
        if self.state != ChannelState::Connecting {
            return Err(ChannelError::InvalidState { state: self.state, operation: "open" });
        }

        self.state = ChannelState::Open;
        self.connect_timer.cancel();
        self.connect_started = None;
        self.backoff.reset();
        self.last_error = None;

        Ok(Vec::new())
    }

    /// Transport reports the connection closed.
    ///
    /// Ignored unless Connecting/Open. Otherwise moves to Closed and
    /// schedules a reconnect if attempts remain.
    pub fn handle_closed(&mut self, reason: &str, now: I) -> Vec<ChannelAction> {
        self.fail(ChannelError::Transport(reason.to_string()), now)
    }

    /// Transport reports an error. Handled like a close.
    pub fn handle_error(&mut self, error: ChannelError, now: I) -> Vec<ChannelAction> {
        self.fail(error, now)
    }

    /// Fire due timers.
    ///
    /// A connect attempt past its timeout is aborted and counts as a failed
    /// attempt. A due reconnect issues a new connect.
    pub fn tick(&mut self, now: I) -> Vec<ChannelAction> {
        let mut actions = Vec::new();

        if self.connect_timer.fire_if_due(now) && self.state == ChannelState::Connecting {
            let elapsed = self.connect_started.map_or(self.config.connect_timeout, |t| now - t);
            actions.push(ChannelAction::Disconnect);
            actions.extend(self.fail(ChannelError::ConnectTimeout { elapsed }, now));
        }

        if self.reconnect_timer.fire_if_due(now)
            && self.state == ChannelState::Closed
            && let Some(actor_id) = self.actor
        {
            actions.push(self.start_connect(actor_id, now));
        }

        actions
    }

    fn start_connect(&mut self, actor_id: u64, now: I) -> ChannelAction {
        self.state = ChannelState::Connecting;
        self.connect_started = Some(now);
        self.connect_timer.arm(now + self.config.connect_timeout);
        ChannelAction::Connect { url: self.url_for(actor_id) }
    }

    fn fail(&mut self, error: ChannelError, now: I) -> Vec<ChannelAction> {
        if !self.state.is_active() {
            return Vec::new();
        }

        self.state = ChannelState::Closed;
        self.connect_timer.cancel();
        self.connect_started = None;
        self.last_error = Some(error);

        if self.actor.is_none() {
            return Vec::new();
        }

        match self.backoff.next_delay() {
            Some(delay) => {
                self.reconnect_timer.arm(now + delay);
                vec![ChannelAction::ReconnectScheduled { attempt: self.backoff.attempts(), delay }]
            },
            None => vec![ChannelAction::GaveUp { attempts: self.backoff.attempts() }],
        }
    }
}
