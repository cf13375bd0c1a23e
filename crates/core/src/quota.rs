//! Daily job quota: tiers, callers and usage windows.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};

/// Length of the rolling quota window, in hours.
pub const QUOTA_WINDOW_HOURS: i64 = 24;

/// Daily job limit for guest sessions.
pub const GUEST_DAILY_LIMIT: i64 = 3;

/// Daily job limit for registered users.
pub const REGISTERED_DAILY_LIMIT: i64 = 20;

/// Daily job limit for elevated (paid / staff) users.
pub const ELEVATED_DAILY_LIMIT: i64 = 200;

/// Account tier, which decides the daily job limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    #[default]
    Guest,
    Registered,
    Elevated,
}

impl UserTier {
    pub fn daily_limit(self) -> i64 {
        match self {
            UserTier::Guest => GUEST_DAILY_LIMIT,
            UserTier::Registered => REGISTERED_DAILY_LIMIT,
            UserTier::Elevated => ELEVATED_DAILY_LIMIT,
        }
    }
}

/// The identity a job request is made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub tier: UserTier,
}

impl Caller {
    pub fn new(user_id: UserId, tier: UserTier) -> Self {
        Self { user_id, tier }
    }
}

/// A user's position in the current quota window, as read from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Jobs triggered in the current window.
    pub used: i64,
    /// Jobs allowed per window for the user's tier.
    pub limit: i64,
    /// When the current window ends and `used` drops back to zero.
    pub reset_at: Timestamp,
}

impl QuotaUsage {
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn remaining(&self) -> i64 {
        (self.limit - self.used).max(0)
    }
}
