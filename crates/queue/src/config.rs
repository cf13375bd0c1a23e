use std::str::FromStr;
use std::time::Duration;

use recap_core::admission::MAX_PENDING_JOBS_PER_USER;
use recap_core::retry::{RetentionPolicy, RetryPolicy};

/// Queue tuning shared by the API server and the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Live jobs allowed per user (default: `25`).
    pub max_pending_per_user: i64,
    /// Attempts per job, including the first (default: `3`).
    pub max_attempts: u32,
    /// Delay after the first failed attempt (default: `2000` ms).
    pub retry_base_delay_ms: u64,
    /// Upper bound on any retry delay (default: `60000` ms).
    pub retry_max_delay_ms: u64,
    /// Completed jobs kept after pruning (default: `1000`).
    pub retention_completed: i64,
    /// Failed jobs kept after pruning (default: `5000`).
    pub retention_failed: i64,
    /// Finished jobs older than this are pruned (default: `24` h).
    pub retention_max_age_hours: i64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let retention = RetentionPolicy::default();
        Self {
            max_pending_per_user: MAX_PENDING_JOBS_PER_USER,
            max_attempts: retry.max_attempts,
            retry_base_delay_ms: retry.base_delay.as_millis() as u64,
            retry_max_delay_ms: retry.max_delay.as_millis() as u64,
            retention_completed: retention.keep_completed,
            retention_failed: retention.keep_failed,
            retention_max_age_hours: retention.max_age.num_hours(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

impl QueueSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `MAX_PENDING_JOBS_PER_USER`   | `25`    |
    /// | `JOB_MAX_ATTEMPTS`            | `3`     |
    /// | `JOB_RETRY_BASE_DELAY_MS`     | `2000`  |
    /// | `JOB_RETRY_MAX_DELAY_MS`      | `60000` |
    /// | `JOB_RETENTION_COMPLETED`     | `1000`  |
    /// | `JOB_RETENTION_FAILED`        | `5000`  |
    /// | `JOB_RETENTION_MAX_AGE_HOURS` | `24`    |
    ///
    /// Panics on a value that does not parse, so a bad deployment fails at
    /// startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_pending_per_user: env_or("MAX_PENDING_JOBS_PER_USER", defaults.max_pending_per_user),
            max_attempts: env_or("JOB_MAX_ATTEMPTS", defaults.max_attempts),
            retry_base_delay_ms: env_or("JOB_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            retry_max_delay_ms: env_or("JOB_RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms),
            retention_completed: env_or("JOB_RETENTION_COMPLETED", defaults.retention_completed),
            retention_failed: env_or("JOB_RETENTION_FAILED", defaults.retention_failed),
            retention_max_age_hours: env_or(
                "JOB_RETENTION_MAX_AGE_HOURS",
                defaults.retention_max_age_hours,
            ),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            multiplier: 2.0,
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            keep_completed: self.retention_completed,
            keep_failed: self.retention_failed,
            max_age: chrono::Duration::hours(self.retention_max_age_hours),
        }
    }
}
