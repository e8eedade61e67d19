//! Bounded exponential backoff.
//!
//! Used for steps that fail while the backend settles, like querying an
//! index that was created moments ago. Delays double from `initial_delay`
//! up to `max_delay`; after `max_attempts` failed attempts the caller
//! gives up.
//!
//! | Attempt | Delay before it |
//! |---------|-----------------|
//! | 1 | `initial_delay` |
//! | 2 | `initial_delay × 2` |
//! | n | `min(initial_delay × 2^(n-1), max_delay)` |
//!
//! The first attempt also waits: a freshly populated index is never
//! queryable immediately.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay to wait before `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `false` if the wait was cancelled.
pub async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
