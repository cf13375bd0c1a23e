use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use recap_core::quota::{Caller, QuotaUsage};
use recap_core::types::UserId;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::quota::{default_window, empty_usage, QuotaWindow};
use crate::store::QuotaLedger;

/// In-memory [`QuotaLedger`] with a configurable rolling window.
pub struct MemoryQuotaLedger {
    window: chrono::Duration,
    windows: Mutex<HashMap<UserId, QuotaWindow>>,
}

impl MemoryQuotaLedger {
    /// Ledger with the standard 24 hour window.
    pub fn new() -> Self {
        Self::with_window(default_window())
    }

    pub fn with_window(window: chrono::Duration) -> Self {
        Self {
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryQuotaLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    async fn get_usage(&self, caller: &Caller) -> Result<QuotaUsage, StoreError> {
        let now = Utc::now();
        let limit = caller.tier.daily_limit();
        let windows = self.windows.lock().await;
        Ok(match windows.get(&caller.user_id) {
            Some(window) => window.usage(limit, now, self.window),
            None => empty_usage(limit, now, self.window),
        })
    }

    async fn record_job(&self, caller: &Caller) -> Result<QuotaUsage, StoreError> {
        let now = Utc::now();
        let mut windows = self.windows.lock().await;
        let window = windows.entry(caller.user_id).or_insert(QuotaWindow {
            used: 0,
            window_started_at: now,
        });

        if window.has_expired(now, self.window) {
            window.used = 0;
            window.window_started_at = now;
        }
        window.used += 1;

        Ok(window.usage(caller.tier.daily_limit(), now, self.window))
    }
}
