//! Protocol errors.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input is not a JSON object with a string `type` field.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The `type` field names a frame this side does not understand.
    #[error("unknown frame type: {0:?}")]
    UnknownType(String),

    /// The `data` field does not match the shape required by `type`.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Frame type whose payload failed to decode.
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Serialization of an outgoing frame failed.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
