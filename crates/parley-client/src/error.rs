//! Client errors.

use parley_core::ChannelError;
use parley_proto::ChatId;
use thiserror::Error;

/// Errors returned by [`crate::Client::handle`].
///
/// Transport and decode failures never show up here: the former degrade to
/// the passive "disconnected" state, the latter are logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The conversation is not in the session.
    #[error("chat {chat_id} not found")]
    ChatNotFound {
        /// Requested conversation
        chat_id: ChatId,
    },

    /// Message content was empty after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// A REST completion referenced a send the client does not know about.
    #[error("unknown send request {request_id}")]
    UnknownRequest {
        /// Request id from the completion
        request_id: u64,
    },

    /// The driver reported a transport event out of order.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl ClientError {
    /// Whether the error is caused by user input and should be shown.
    ///
    /// The rest indicate a driver bug and are only logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::ChatNotFound { .. } | Self::EmptyMessage)
    }
}
