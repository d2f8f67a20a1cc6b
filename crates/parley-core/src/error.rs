//! Channel errors.

use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelState;

/// Errors raised by the channel state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Transport event arrived in a state that cannot accept it.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: ChannelState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Connect attempt did not reach Open in time.
    #[error("connect timeout after {elapsed:?}")]
    ConnectTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Underlying transport closed or failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChannelError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Timeouts and transport failures are retried with backoff. A state
    /// violation means the driver fed events out of order.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::Transport(_))
    }
}
