//! The admission gate in front of the queue.

use std::sync::Arc;

use recap_core::admission::{check_pending_cap, check_quota, AdmissionRejection};
use recap_core::quota::{Caller, QuotaUsage};
use recap_db::QuotaLedger;

use crate::error::QueueError;
use crate::queue::JobQueue;

/// Result of [`AdmissionController::try_admit`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// The caller may enqueue one job. `usage` is the ledger state before it.
    Admitted { usage: QuotaUsage },
    Rejected(AdmissionRejection),
}

/// Checks the daily quota, then the live job cap.
///
/// Admission is read-only. The check and the caller's subsequent enqueue
/// are not atomic, so concurrent requests from one user can overshoot the
/// cap slightly.
pub struct AdmissionController {
    ledger: Arc<dyn QuotaLedger>,
    queue: Arc<JobQueue>,
    max_pending: i64,
}

impl AdmissionController {
    pub fn new(ledger: Arc<dyn QuotaLedger>, queue: Arc<JobQueue>, max_pending: i64) -> Self {
        Self {
            ledger,
            queue,
            max_pending,
        }
    }

    pub fn max_pending(&self) -> i64 {
        self.max_pending
    }

    pub async fn try_admit(&self, caller: &Caller) -> Result<AdmissionDecision, QueueError> {
        let usage = self.ledger.get_usage(caller).await?;
        if let Err(rejection) = check_quota(&usage) {
            tracing::info!(
                user_id = caller.user_id,
                used = usage.used,
                limit = usage.limit,
                "Daily quota exceeded",
            );
            return Ok(AdmissionDecision::Rejected(rejection));
        }

        let live = self.queue.list_live(caller.user_id).await?;
        if let Err(rejection) = check_pending_cap(live, self.max_pending) {
            tracing::info!(
                user_id = caller.user_id,
                live,
                cap = self.max_pending,
                "Pending job cap reached",
            );
            return Ok(AdmissionDecision::Rejected(rejection));
        }

        Ok(AdmissionDecision::Admitted { usage })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use recap_core::job::NewJob;
    use recap_core::quota::UserTier;
    use recap_core::retry::RetryPolicy;
    use recap_db::memory::{MemoryJobBackend, MemoryQuotaLedger};

    use super::*;

    struct Fixture {
        ledger: Arc<MemoryQuotaLedger>,
        queue: Arc<JobQueue>,
        admission: AdmissionController,
    }

    fn fixture(max_pending: i64) -> Fixture {
        let ledger = Arc::new(MemoryQuotaLedger::new());
        let queue = Arc::new(JobQueue::new(
            Arc::new(MemoryJobBackend::new()),
            RetryPolicy::default(),
        ));
        let admission = AdmissionController::new(ledger.clone(), queue.clone(), max_pending);
        Fixture {
            ledger,
            queue,
            admission,
        }
    }

    async fn fill_queue(queue: &JobQueue, owner: i64, count: i64) {
        for resource_id in 0..count {
            queue
                .enqueue(NewJob {
                    resource_id,
                    owner_user_id: owner,
                    payload: serde_json::Value::Null,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn admits_with_room() {
        let f = fixture(25);
        let caller = Caller::new(1, UserTier::Guest);
        let decision = f.admission.try_admit(&caller).await.unwrap();
        assert_matches!(
            decision,
            AdmissionDecision::Admitted { usage } if usage.used == 0 && usage.limit == 3
        );
    }

    #[tokio::test]
    async fn exhausted_quota_is_rejected() {
        let f = fixture(25);
        let caller = Caller::new(1, UserTier::Guest);
        for _ in 0..3 {
            f.ledger.record_job(&caller).await.unwrap();
        }

        let decision = f.admission.try_admit(&caller).await.unwrap();
        assert_matches!(
            decision,
            AdmissionDecision::Rejected(AdmissionRejection::DailyQuotaExceeded {
                used: 3,
                limit: 3,
                ..
            })
        );
    }

    #[tokio::test]
    async fn quota_is_checked_before_cap() {
        let f = fixture(1);
        let caller = Caller::new(1, UserTier::Guest);
        fill_queue(&f.queue, 1, 1).await;
        for _ in 0..3 {
            f.ledger.record_job(&caller).await.unwrap();
        }

        let decision = f.admission.try_admit(&caller).await.unwrap();
        assert_matches!(
            decision,
            AdmissionDecision::Rejected(AdmissionRejection::DailyQuotaExceeded { .. })
        );
    }

    #[tokio::test]
    async fn full_pipeline_is_rejected_despite_quota() {
        let f = fixture(25);
        let caller = Caller::new(1, UserTier::Elevated);
        fill_queue(&f.queue, 1, 25).await;

        let decision = f.admission.try_admit(&caller).await.unwrap();
        assert_matches!(
            decision,
            AdmissionDecision::Rejected(AdmissionRejection::PendingJobCapExceeded {
                live: 25,
                cap: 25
            })
        );
    }

    #[tokio::test]
    async fn admission_never_touches_the_ledger() {
        let f = fixture(25);
        let caller = Caller::new(1, UserTier::Registered);
        for _ in 0..5 {
            f.admission.try_admit(&caller).await.unwrap();
        }
        assert_eq!(f.ledger.get_usage(&caller).await.unwrap().used, 0);
        assert_eq!(f.queue.list_live(1).await.unwrap(), 0);
    }
}
