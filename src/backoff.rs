//! Bounded exponential backoff with reset, used by the tenant pusher between
//! failed send attempts.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::sleeper::{Sleeper, TokioSleeper};

pub const DEFAULT_MIN: Duration = Duration::from_millis(30);
pub const DEFAULT_MAX: Duration = Duration::from_secs(2);

/// Doubles the delay on every call, starting from `min` and capping at
/// `max`, until [`Backoff::reset`] is called.
pub struct Backoff {
    min: Duration,
    max: Duration,
    next: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max, next: Duration::ZERO, sleeper: Arc::new(TokioSleeper) }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Sleeps for the next interval, or returns early if `cancel` fires
    /// first. Returns `true` if the full delay elapsed, `false` if
    /// cancelled.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.advance();
        tokio::select! {
            _ = self.sleeper.sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Advances and returns the next delay without sleeping. Exposed so
    /// callers that already have their own sleep/cancel plumbing (the
    /// sending loop's `select!`) can reuse the same progression.
    pub fn advance(&mut self) -> Duration {
        let delay = if self.next.is_zero() { self.min } else { (self.next * 2).min(self.max) };
        self.next = delay;
        delay
    }

    /// Resets to the initial `min` delay, as if no attempt had yet failed.
    pub fn reset(&mut self) {
        self.next = Duration::ZERO;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN, DEFAULT_MAX)
    }
}
