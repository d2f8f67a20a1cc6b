//! Capped exponential backoff.
//!
//! The attempt counter is incremented *before* the delay is computed, so the
//! first retry already waits `base * 2`. With the defaults (1 s base, 10 s
//! cap, 3 attempts) the schedule is 2 s, 4 s, 8 s, then nothing.

use std::time::Duration;

/// Reconnect schedule with a bounded number of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    /// New schedule with no attempts consumed.
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self { base, cap, max_attempts, attempts: 0 }
    }

    /// Consume one attempt and return how long to wait before it.
    ///
    /// `None` once `max_attempts` have been consumed. Stays `None` until
    /// [`reset`](Self::reset).
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }

        self.attempts += 1;
        let factor = 2u32.saturating_pow(self.attempts);
        Some(self.base.saturating_mul(factor).min(self.cap))
    }

    /// Forget consumed attempts. Called when a connection opens.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Upper bound on attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether every attempt has been used.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
