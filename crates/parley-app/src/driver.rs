//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use crate::{App, AppEvent, Effect, RestResult};

/// Something that happened outside the state machines.
#[derive(Debug, Clone)]
pub enum DriverInput<I> {
    /// User input for the App.
    App(AppEvent<I>),
    /// The WebSocket connected.
    Opened,
    /// The WebSocket closed.
    Closed {
        /// Close reason.
        reason: String,
    },
    /// The WebSocket failed to connect or broke.
    Failed {
        /// What went wrong.
        reason: String,
    },
    /// Text frame from the server.
    Frame(String),
    /// A REST call finished.
    Rest(RestResult),
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in production and simulation.
///
/// # Implementations
///
/// - **CLI**: Line-based stdin, WebSocket transport, HTTP REST client
/// - **Simulation**: In-process server on a virtual clock
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Wait for the next input, but not past `deadline`.
    ///
    /// Returns `None` when nothing arrived in time; the runtime ticks the
    /// state machines either way.
    fn poll_input(
        &mut self,
        deadline: Option<Self::Instant>,
    ) -> impl Future<Output = Result<Option<DriverInput<Self::Instant>>, Self::Error>> + Send;

    /// Perform an effect. Results arrive later through
    /// [`Self::poll_input`].
    ///
    /// # Errors
    ///
    /// Returns an error only for failures the session cannot continue
    /// from. Network failures are reported as inputs instead.
    fn execute(&mut self, effect: Effect) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App<Self::Instant>) -> Result<(), Self::Error>;

    /// Stop the connection and clean up resources.
    fn stop(&mut self);
}
