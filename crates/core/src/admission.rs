//! Admission rules applied before a job may enter the queue.
//!
//! The checks are pure; reading the ledger and counting live jobs is done
//! by the queue crate's `AdmissionController`.

use serde::Serialize;

use crate::quota::QuotaUsage;
use crate::types::Timestamp;

/// Ceiling on live (not yet terminal) jobs per user, regardless of tier.
pub const MAX_PENDING_JOBS_PER_USER: i64 = 25;

/// Why a job request was turned away. Both are expected, user-actionable
/// outcomes rather than faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AdmissionRejection {
    #[error("Daily limit of {limit} summaries reached, resets at {reset_at}")]
    DailyQuotaExceeded {
        used: i64,
        limit: i64,
        reset_at: Timestamp,
    },

    #[error("Too many summaries in progress ({live} of {cap}), wait for some to finish")]
    PendingJobCapExceeded { live: i64, cap: i64 },
}

impl AdmissionRejection {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionRejection::DailyQuotaExceeded { .. } => "DAILY_QUOTA_EXCEEDED",
            AdmissionRejection::PendingJobCapExceeded { .. } => "PENDING_JOB_CAP_EXCEEDED",
        }
    }
}

/// First check: the user's quota window must have room left.
pub fn check_quota(usage: &QuotaUsage) -> Result<(), AdmissionRejection> {
    if usage.is_exhausted() {
        return Err(AdmissionRejection::DailyQuotaExceeded {
            used: usage.used,
            limit: usage.limit,
            reset_at: usage.reset_at,
        });
    }
    Ok(())
}

/// Second check: the user's live job count must be under the cap.
pub fn check_pending_cap(live: i64, cap: i64) -> Result<(), AdmissionRejection> {
    if live >= cap {
        return Err(AdmissionRejection::PendingJobCapExceeded { live, cap });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(used: i64, limit: i64) -> QuotaUsage {
        QuotaUsage {
            used,
            limit,
            reset_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn quota_with_room_passes() {
        assert!(check_quota(&usage(2, 3)).is_ok());
    }

    #[test]
    fn quota_at_limit_rejects() {
        let err = check_quota(&usage(3, 3)).unwrap_err();
        assert_eq!(err.code(), "DAILY_QUOTA_EXCEEDED");
    }

    #[test]
    fn cap_rejects_at_ceiling() {
        assert!(check_pending_cap(24, 25).is_ok());
        let err = check_pending_cap(25, 25).unwrap_err();
        assert_eq!(err, AdmissionRejection::PendingJobCapExceeded { live: 25, cap: 25 });
        assert_eq!(err.code(), "PENDING_JOB_CAP_EXCEEDED");
    }

    #[test]
    fn rejection_messages_differ() {
        let quota = check_quota(&usage(3, 3)).unwrap_err().to_string();
        let cap = check_pending_cap(25, 25).unwrap_err().to_string();
        assert_ne!(quota, cap);
        assert!(quota.contains("Daily limit"));
        assert!(cap.contains("in progress"));
    }
}
