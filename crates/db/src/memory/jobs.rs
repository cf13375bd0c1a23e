use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use recap_core::job::{ClaimedJob, JobDescriptor, NewJob};
use recap_core::retry::RetentionPolicy;
use recap_core::types::{JobId, ResourceId, Timestamp, UserId};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::job::JobRecord;
use crate::models::status::JobState;
use crate::store::JobBackend;

#[derive(Default)]
struct Jobs {
    next_id: JobId,
    by_id: BTreeMap<JobId, JobRecord>,
}

impl Jobs {
    fn running(&mut self, id: JobId) -> Result<&mut JobRecord, StoreError> {
        self.by_id
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "Job", id })
    }

    fn finished_ids(&self, state: JobState) -> Vec<JobId> {
        let mut finished: Vec<&JobRecord> =
            self.by_id.values().filter(|job| job.state == state).collect();
        finished.sort_by(|a, b| {
            b.finished_at
                .cmp(&a.finished_at)
                .then(b.descriptor.id.cmp(&a.descriptor.id))
        });
        finished.into_iter().map(|job| job.descriptor.id).collect()
    }
}

/// In-memory [`JobBackend`].
///
/// Claims are serialized by a single mutex, so each job is delivered to at
/// most one caller at a time.
#[derive(Default)]
pub struct MemoryJobBackend {
    inner: Mutex<Jobs>,
}

impl MemoryJobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently held, in any state.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobBackend for MemoryJobBackend {
    async fn insert(&self, job: &NewJob) -> Result<JobDescriptor, StoreError> {
        let mut jobs = self.inner.lock().await;
        jobs.next_id += 1;
        let now = Utc::now();
        let descriptor = JobDescriptor {
            id: jobs.next_id,
            resource_id: job.resource_id,
            owner_user_id: job.owner_user_id,
            payload: job.payload.clone(),
        };
        jobs.by_id.insert(
            descriptor.id,
            JobRecord {
                descriptor: descriptor.clone(),
                state: JobState::Queued,
                attempts: 0,
                run_at: now,
                last_error: None,
                finished_at: None,
                created_at: now,
            },
        );
        Ok(descriptor)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.inner.lock().await.by_id.get(&id).cloned())
    }

    async fn count_live_by_owner(&self, owner: UserId) -> Result<i64, StoreError> {
        let jobs = self.inner.lock().await;
        Ok(jobs
            .by_id
            .values()
            .filter(|job| job.descriptor.owner_user_id == owner && job.state.is_live())
            .count() as i64)
    }

    async fn count_live_by_resource(&self, resource: ResourceId) -> Result<i64, StoreError> {
        let jobs = self.inner.lock().await;
        Ok(jobs
            .by_id
            .values()
            .filter(|job| job.descriptor.resource_id == resource && job.state.is_live())
            .count() as i64)
    }

    async fn claim_next(&self, _worker_id: &str) -> Result<Option<ClaimedJob>, StoreError> {
        let now = Utc::now();
        let mut jobs = self.inner.lock().await;
        let next = jobs
            .by_id
            .values()
            .filter(|job| job.state.is_claimable() && job.run_at <= now)
            .min_by_key(|job| (job.run_at, job.descriptor.id))
            .map(|job| job.descriptor.id);

        let Some(id) = next else {
            return Ok(None);
        };
        let job = jobs.running(id)?;
        job.state = JobState::Running;
        job.attempts += 1;

        Ok(Some(ClaimedJob {
            descriptor: job.descriptor.clone(),
            attempt: job.attempts,
        }))
    }

    async fn schedule_retry(
        &self,
        id: JobId,
        run_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut jobs = self.inner.lock().await;
        let job = jobs.running(id)?;
        job.state = JobState::RetryScheduled;
        job.run_at = run_at;
        job.last_error = Some(error.to_string());
        Ok(())
    }

    async fn mark_completed(&self, id: JobId) -> Result<(), StoreError> {
        let mut jobs = self.inner.lock().await;
        let job = jobs.running(id)?;
        job.state = JobState::Completed;
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        let mut jobs = self.inner.lock().await;
        let job = jobs.running(id)?;
        job.state = JobState::Failed;
        job.last_error = Some(error.to_string());
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, StoreError> {
        let cutoff = now - policy.max_age;
        let mut jobs = self.inner.lock().await;
        let before = jobs.by_id.len();

        jobs.by_id
            .retain(|_, job| !matches!(job.finished_at, Some(at) if at < cutoff));

        for (state, keep) in [
            (JobState::Completed, policy.keep_completed),
            (JobState::Failed, policy.keep_failed),
        ] {
            let surplus = jobs.finished_ids(state);
            for id in surplus.into_iter().skip(keep.max(0) as usize) {
                jobs.by_id.remove(&id);
            }
        }

        Ok((before - jobs.by_id.len()) as u64)
    }
}
