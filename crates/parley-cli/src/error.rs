//! Errors that end the process.

use parley_client::api::ApiError;
use thiserror::Error;

use crate::TerminalError;

/// Errors reported by the `parley` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration, login or another REST call failed.
    #[error("api: {0}")]
    Api(#[from] ApiError),

    /// The terminal stopped working.
    #[error("terminal: {0}")]
    Terminal(#[from] TerminalError),

    /// Logging could not be set up.
    #[error("logging: {0}")]
    Logging(String),
}
