//! Automatic retry backoff and retention of finished jobs.

use std::time::Duration;

/// Default number of attempts per job, counting the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default upper bound on the delay between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Bounded exponential backoff applied by the queue between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed per job, including the first. Never below 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Factor by which the delay grows after each further failure.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: 2.0,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Whether a job whose `attempt`-th try just failed gets another one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Delay to wait after the `attempt`-th (1-based) failed try.
    ///
    /// The result is clamped to [`RetryPolicy::max_delay`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        if !ms.is_finite() || ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(ms as u64)
    }
}

/// How many finished jobs the queue keeps around for inspection.
///
/// Pruning is housekeeping only; the record store holds the authoritative
/// terminal state of every resource.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPolicy {
    /// Newest completed jobs kept.
    pub keep_completed: i64,
    /// Newest failed jobs kept.
    pub keep_failed: i64,
    /// Finished jobs older than this are removed regardless of count.
    pub max_age: chrono::Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_completed: 1000,
            keep_failed: 5000,
            max_age: chrono::Duration::hours(24),
        }
    }
}
