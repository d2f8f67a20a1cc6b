//! Message composer and sender-side typing state.
//!
//! The composer reports typing as started on the first keystroke of a
//! non-blank draft and as stopped after [`TYPING_IDLE`] without a keystroke,
//! on send, or when the conversation is left. Each transition is reported
//! exactly once; the caller turns it into a typing notice.

use std::time::Duration;

use parley_core::Timer;

/// Keystroke inactivity after which typing is reported as stopped.
pub const TYPING_IDLE: Duration = Duration::from_secs(3);

/// Draft text plus the idle timer that ends a typing burst.
#[derive(Debug, Clone)]
pub struct Composer<I> {
    draft: String,
    typing: bool,
    idle: Timer<I>,
}

impl<I> Default for Composer<I> {
    fn default() -> Self {
        Self { draft: String::new(), typing: false, idle: Timer::default() }
    }
}

impl<I> Composer<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current draft.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Whether a typing burst is in progress.
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// When the idle timer fires, if armed.
    pub fn deadline(&self) -> Option<I> {
        self.idle.deadline()
    }

    /// Append a character. Returns the typing transition, if any.
    pub fn insert(&mut self, c: char, now: I) -> Option<bool> {
        self.draft.push(c);
        self.touched(now)
    }

    /// Delete the last character.
    pub fn backspace(&mut self, now: I) -> Option<bool> {
        self.draft.pop();
        self.touched(now)
    }

    /// Replace the whole draft.
    pub fn set_draft(&mut self, draft: impl Into<String>, now: I) -> Option<bool> {
        self.draft = draft.into();
        self.touched(now)
    }

    /// End the burst if the idle timer has fired.
    pub fn tick(&mut self, now: I) -> Option<bool> {
        if self.idle.fire_if_due(now) && self.typing {
            self.typing = false;
            return Some(false);
        }
        None
    }

    /// Take the draft for sending. `None` if it is blank, in which case the
    /// draft is left alone. The second element is whether a burst ended.
    pub fn take(&mut self) -> Option<(String, bool)> {
        if self.draft.trim().is_empty() {
            return None;
        }
        let content = std::mem::take(&mut self.draft);
        Some((content, self.stop()))
    }

    /// Put back text from a failed send, unless a new draft was started.
    pub fn restore(&mut self, content: String) -> bool {
        if !self.draft.is_empty() {
            return false;
        }
        self.draft = content;
        true
    }

    /// Clear everything, for leaving the conversation. Returns whether a
    /// burst ended.
    pub fn teardown(&mut self) -> bool {
        self.draft.clear();
        self.stop()
    }

    fn touched(&mut self, now: I) -> Option<bool> {
        if self.draft.trim().is_empty() {
            return self.stop().then_some(false);
        }
        self.idle.arm(now + TYPING_IDLE);
        if self.typing {
            return None;
        }
        self.typing = true;
        Some(true)
    }

    fn stop(&mut self) -> bool {
        self.idle.cancel();
        std::mem::replace(&mut self.typing, false)
    }
}
