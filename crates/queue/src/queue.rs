//! The durable job queue.
//!
//! Delivery is at-least-once: a claimed job stays `running` until the
//! executor reports back through [`JobQueue::on_result`]. Failed attempts are
//! redelivered after an exponentially growing delay stored on the job as its
//! next `run_at`, until the [`RetryPolicy`] runs out.

use std::sync::Arc;

use chrono::Utc;
use recap_core::job::{ClaimedJob, JobDescriptor, NewJob};
use recap_core::retry::{RetentionPolicy, RetryPolicy};
use recap_core::types::{JobId, ResourceId, Timestamp, UserId};
use recap_db::models::job::JobRecord;
use recap_db::JobBackend;

use crate::error::QueueError;

/// What the executor observed for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    Succeeded,
    /// `retryable` is false for failures another attempt cannot fix.
    Failed { error: String, retryable: bool },
}

/// What the queue did with a job after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Completed,
    /// The job will be delivered again from `run_at`.
    RetryScheduled { attempt: u32, run_at: Timestamp },
    /// The job is terminally failed. The executor reports this once.
    Failed { attempts: u32, error: String },
}

/// Job queue over a [`JobBackend`].
pub struct JobQueue {
    backend: Arc<dyn JobBackend>,
    policy: RetryPolicy,
}

impl JobQueue {
    pub fn new(backend: Arc<dyn JobBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Append a job. It is claimable as soon as this returns.
    pub async fn enqueue(&self, job: NewJob) -> Result<JobDescriptor, QueueError> {
        let descriptor = self.backend.insert(&job).await?;
        tracing::info!(
            job_id = descriptor.id,
            resource_id = descriptor.resource_id,
            user_id = descriptor.owner_user_id,
            "Job enqueued",
        );
        Ok(descriptor)
    }

    /// Number of live (queued, running or retry-scheduled) jobs of `user_id`.
    pub async fn list_live(&self, user_id: UserId) -> Result<i64, QueueError> {
        Ok(self.backend.count_live_by_owner(user_id).await?)
    }

    /// Number of live jobs driving `resource_id`.
    pub async fn live_for_resource(&self, resource_id: ResourceId) -> Result<i64, QueueError> {
        Ok(self.backend.count_live_by_resource(resource_id).await?)
    }

    pub async fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.backend.get(job_id).await?)
    }

    /// Hand the next due job to `worker_id`, if any.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, QueueError> {
        let claimed = self.backend.claim_next(worker_id).await?;
        if let Some(job) = &claimed {
            tracing::debug!(
                job_id = job.descriptor.id,
                worker_id,
                attempt = job.attempt,
                "Job claimed",
            );
        }
        Ok(claimed)
    }

    /// Record the result of the current attempt of `job_id`.
    pub async fn on_result(
        &self,
        job_id: JobId,
        result: AttemptResult,
    ) -> Result<Disposition, QueueError> {
        let job = self
            .backend
            .get(job_id)
            .await?
            .ok_or(QueueError::UnknownJob(job_id))?;
        let attempt = job.attempts;

        match result {
            AttemptResult::Succeeded => {
                self.backend.mark_completed(job_id).await?;
                tracing::info!(job_id, attempt, "Job completed");
                Ok(Disposition::Completed)
            }
            AttemptResult::Failed { error, retryable }
                if retryable && self.policy.should_retry(attempt) =>
            {
                let delay = self.policy.delay_after(attempt);
                let run_at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
                self.backend.schedule_retry(job_id, run_at, &error).await?;
                tracing::warn!(
                    job_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Job attempt failed, retry scheduled",
                );
                Ok(Disposition::RetryScheduled { attempt, run_at })
            }
            AttemptResult::Failed { error, retryable } => {
                self.backend.mark_failed(job_id, &error).await?;
                tracing::error!(
                    job_id,
                    attempts = attempt,
                    retryable,
                    error = %error,
                    "Job failed",
                );
                Ok(Disposition::Failed {
                    attempts: attempt,
                    error,
                })
            }
        }
    }

    /// Drop finished jobs beyond `retention`. Returns the number removed.
    pub async fn prune(&self, retention: &RetentionPolicy) -> Result<u64, QueueError> {
        Ok(self.backend.prune(retention, Utc::now()).await?)
    }
}
