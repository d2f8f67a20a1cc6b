//! Environment abstraction for deterministic testing.
//!
//! Decouples sync logic from the system clock. Simulations drive a virtual
//! clock; production reads real monotonic and wall-clock time.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`; simulations use a virtual
    /// instant that only advances when the test says so.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the given duration.
    ///
    /// Only driver code awaits this; state machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Current wall-clock time.
    ///
    /// Used to stamp optimistic messages before the server assigns a
    /// canonical timestamp.
    fn timestamp(&self) -> DateTime<Utc>;
}
