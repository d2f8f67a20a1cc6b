//! Production environment backed by the system clock.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::env::Environment;

/// Production environment.
///
/// `std::time::Instant` for monotonic time, `tokio::time::sleep` for delays
/// and `chrono::Utc::now` for message timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::disallowed_methods)]
    fn timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
