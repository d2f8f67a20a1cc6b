//! Cancellable one-shot timers.
//!
//! A [`Timer`] is just an optional deadline. Its owner arms it, cancels it
//! and polls it with the current time from `tick`. Nothing fires on its own,
//! so dropping or cancelling the owner cancels the timer with it.

/// One-shot deadline owned by a state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer<I> {
    deadline: Option<I>,
}

impl<I> Default for Timer<I> {
    fn default() -> Self {
        Self { deadline: None }
    }
}

impl<I: Copy + Ord> Timer<I> {
    /// Disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer. Any previous deadline is replaced.
    pub fn arm(&mut self, deadline: I) {
        self.deadline = Some(deadline);
    }

    /// Disarm the timer. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline, if any.
    pub fn deadline(&self) -> Option<I> {
        self.deadline
    }

    /// Fire the timer if its deadline has passed.
    ///
    /// Returns `true` exactly once per arming; the timer is disarmed when it
    /// fires.
    pub fn fire_if_due(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_deadline() {
        let mut timer = Timer::new();
        timer.arm(10u64);

        assert!(!timer.fire_if_due(9));
        assert!(timer.fire_if_due(10));
        assert!(!timer.fire_if_due(11));
        assert!(!timer.is_armed());
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut timer = Timer::new();
        timer.arm(5u64);

        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.fire_if_due(100));
    }

    #[test]
    fn rearm_replaces_deadline() {
        let mut timer = Timer::new();
        timer.arm(5u64);
        timer.arm(20u64);

        assert!(!timer.fire_if_due(10));
        assert_eq!(timer.deadline(), Some(20));
    }
}
