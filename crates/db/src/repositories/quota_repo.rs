//! Repository for the `quota_windows` table.

use async_trait::async_trait;
use chrono::Utc;
use recap_core::quota::{Caller, QuotaUsage, QUOTA_WINDOW_HOURS};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::quota::{default_window, empty_usage, QuotaWindow};
use crate::store::QuotaLedger;

/// Postgres-backed [`QuotaLedger`] with a rolling 24h window per user.
#[derive(Clone)]
pub struct PgQuotaLedger {
    pool: PgPool,
}

impl PgQuotaLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaLedger for PgQuotaLedger {
    async fn get_usage(&self, caller: &Caller) -> Result<QuotaUsage, StoreError> {
        let window = sqlx::query_as::<_, QuotaWindow>(
            "SELECT used, window_started_at FROM quota_windows WHERE user_id = $1",
        )
        .bind(caller.user_id)
        .fetch_optional(&self.pool)
        .await?;

        let now = Utc::now();
        let limit = caller.tier.daily_limit();
        Ok(match window {
            Some(window) => window.usage(limit, now, default_window()),
            None => empty_usage(limit, now, default_window()),
        })
    }

    /// Upsert that starts a fresh window when the stored one has expired.
    async fn record_job(&self, caller: &Caller) -> Result<QuotaUsage, StoreError> {
        let window = sqlx::query_as::<_, QuotaWindow>(
            "INSERT INTO quota_windows (user_id, used, window_started_at) \
             VALUES ($1, 1, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 used = CASE \
                     WHEN quota_windows.window_started_at + make_interval(hours => $2) <= NOW() \
                     THEN 1 ELSE quota_windows.used + 1 END, \
                 window_started_at = CASE \
                     WHEN quota_windows.window_started_at + make_interval(hours => $2) <= NOW() \
                     THEN NOW() ELSE quota_windows.window_started_at END \
             RETURNING used, window_started_at",
        )
        .bind(caller.user_id)
        .bind(QUOTA_WINDOW_HOURS as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(window.usage(caller.tier.daily_limit(), Utc::now(), default_window()))
    }
}
