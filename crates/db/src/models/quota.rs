//! Quota window rows.

use recap_core::quota::{QuotaUsage, QUOTA_WINDOW_HOURS};
use recap_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `quota_windows` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct QuotaWindow {
    pub used: i32,
    pub window_started_at: Timestamp,
}

/// Default window length.
pub fn default_window() -> chrono::Duration {
    chrono::Duration::hours(QUOTA_WINDOW_HOURS)
}

impl QuotaWindow {
    /// Whether the window has run its course at `now`.
    pub fn has_expired(&self, now: Timestamp, window: chrono::Duration) -> bool {
        self.window_started_at + window <= now
    }

    /// Usage as seen at `now`. An expired window reads as empty; it is only
    /// rewritten when the next job is recorded.
    pub fn usage(&self, limit: i64, now: Timestamp, window: chrono::Duration) -> QuotaUsage {
        if self.has_expired(now, window) {
            return empty_usage(limit, now, window);
        }
        QuotaUsage {
            used: i64::from(self.used),
            limit,
            reset_at: self.window_started_at + window,
        }
    }
}

/// Usage for a user with no open window.
pub fn empty_usage(limit: i64, now: Timestamp, window: chrono::Duration) -> QuotaUsage {
    QuotaUsage {
        used: 0,
        limit,
        reset_at: now + window,
    }
}
