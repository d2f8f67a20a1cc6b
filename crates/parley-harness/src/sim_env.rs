//! Virtual-time environment.
//!
//! Time only moves when a test calls [`SimEnv::advance`] or a driver sleeps.
//! Clones share one clock, so a client, its driver and the simulated server
//! always agree on "now".

use std::{
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use parley_core::Environment;

/// Wall-clock time at virtual zero: 2024-01-01T00:00:00Z.
const DEFAULT_EPOCH_SECS: i64 = 1_704_067_200;

/// A point on the virtual clock, as an offset from its start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Instant `offset` after the start of the clock.
    pub fn from_start(offset: Duration) -> Self {
        Self(offset)
    }

    /// Offset from the start of the clock.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    /// Saturates at zero, like `Instant::saturating_duration_since`.
    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

/// Shared virtual clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    /// Microseconds since the start.
    micros: Arc<AtomicU64>,
    epoch: DateTime<Utc>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Clock at zero, with wall-clock time starting at 2024-01-01.
    pub fn new() -> Self {
        let epoch = DateTime::UNIX_EPOCH + TimeDelta::seconds(DEFAULT_EPOCH_SECS);
        Self::with_epoch(epoch)
    }

    /// Clock at zero with a custom wall-clock origin.
    pub fn with_epoch(epoch: DateTime<Utc>) -> Self {
        Self { micros: Arc::new(AtomicU64::new(0)), epoch }
    }

    /// Move every clone of this clock forward.
    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Time since the start.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    /// Advances the clock instead of waiting.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.epoch + TimeDelta::from_std(self.elapsed()).unwrap_or_default()
    }
}
