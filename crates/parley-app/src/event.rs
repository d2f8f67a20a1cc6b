//! Application input events.
//!
//! Events originate from two distinct sources:
//! - User interactions (keys, commands) and timer ticks, which carry the
//!   current time for the composer's typing timer.
//! - Notifications translated from the client by the [`crate::Bridge`].

use std::sync::Arc;

use parley_client::Session;
use parley_core::ChannelState;
use parley_proto::ChatId;

use crate::{Command, KeyInput};

/// Events processed by the App state machine.
#[derive(Debug, Clone)]
pub enum AppEvent<I = std::time::Instant> {
    /// Keyboard input.
    Key {
        /// Key pressed.
        input: KeyInput,
        /// Current time.
        now: I,
    },

    /// A parsed input line.
    Command {
        /// Command to run.
        command: Command,
        /// Current time.
        now: I,
    },

    /// Periodic tick.
    Tick {
        /// Current time.
        now: I,
    },

    /// The client published a new session snapshot.
    SessionUpdated(Arc<Session<I>>),

    /// The realtime channel changed state.
    ChannelChanged(ChannelState),

    /// A message arrived in a conversation that is not open.
    Notification {
        /// Conversation.
        chat_id: ChatId,
        /// Title line.
        title: String,
        /// Body text.
        body: String,
        /// Replacement key.
        tag: String,
    },

    /// A send failed; the text is handed back.
    SendFailed {
        /// Conversation.
        chat_id: ChatId,
        /// Original text.
        content: String,
        /// Why it failed.
        reason: String,
    },

    /// Reconnects were exhausted.
    RealtimeUnavailable {
        /// Attempts made.
        attempts: u32,
    },

    /// The session ended.
    LoggedOut,

    /// Error to show to the user.
    Error {
        /// Error description.
        message: String,
    },
}
