//! Repository for the `summary_jobs` table.
//!
//! Uses `JobState` from `models::status` for every state literal. Claiming
//! uses `SELECT FOR UPDATE SKIP LOCKED` so several workers can poll the same
//! table without double delivery.

use async_trait::async_trait;
use recap_core::job::{ClaimedJob, JobDescriptor, NewJob};
use recap_core::retry::RetentionPolicy;
use recap_core::types::{JobId, ResourceId, Timestamp, UserId};
use sqlx::{FromRow, PgPool};

use crate::error::StoreError;
use crate::models::job::{JobRecord, JobRow};
use crate::models::status::{JobState, StatusId, LIVE_JOB_STATES};
use crate::store::JobBackend;

/// Column list for `summary_jobs` queries.
const COLUMNS: &str = "\
    id, resource_id, owner_user_id, payload, state_id, attempts, \
    run_at, last_error, finished_at, created_at";

/// Minimal projection returned by a claim.
#[derive(Debug, FromRow)]
struct ClaimRow {
    id: JobId,
    resource_id: ResourceId,
    owner_user_id: UserId,
    payload: serde_json::Value,
    attempts: i32,
}

/// Postgres-backed [`JobBackend`].
#[derive(Clone)]
pub struct PgJobBackend {
    pool: PgPool,
}

impl PgJobBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Move a running job to a terminal state.
    async fn finish(
        &self,
        id: JobId,
        state: JobState,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE summary_jobs \
             SET state_id = $2, last_error = COALESCE($3, last_error), \
                 finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(state.id())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Job", id });
        }
        Ok(())
    }

    /// Delete all but the newest `keep` finished jobs in `state`.
    async fn prune_beyond(&self, state: JobState, keep: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM summary_jobs WHERE id IN ( \
                 SELECT id FROM summary_jobs \
                 WHERE state_id = $1 \
                 ORDER BY finished_at DESC, id DESC \
                 OFFSET $2 \
             )",
        )
        .bind(state.id())
        .bind(keep.max(0))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobBackend for PgJobBackend {
    async fn insert(&self, job: &NewJob) -> Result<JobDescriptor, StoreError> {
        let query = format!(
            "INSERT INTO summary_jobs (resource_id, owner_user_id, payload, state_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job.resource_id)
            .bind(job.owner_user_id)
            .bind(&job.payload)
            .bind(JobState::Queued.id())
            .fetch_one(&self.pool)
            .await?;
        let record = JobRecord::try_from(row)?;
        Ok(record.descriptor)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM summary_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRecord::try_from).transpose()
    }

    async fn count_live_by_owner(&self, owner: UserId) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM summary_jobs \
             WHERE owner_user_id = $1 AND state_id = ANY($2)",
        )
        .bind(owner)
        .bind(&LIVE_JOB_STATES[..])
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_live_by_resource(&self, resource: ResourceId) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM summary_jobs \
             WHERE resource_id = $1 AND state_id = ANY($2)",
        )
        .bind(resource)
        .bind(&LIVE_JOB_STATES[..])
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, StoreError> {
        let claimable: [StatusId; 2] = [JobState::Queued.id(), JobState::RetryScheduled.id()];
        let row = sqlx::query_as::<_, ClaimRow>(
            "UPDATE summary_jobs \
             SET state_id = $1, attempts = attempts + 1, claimed_by = $2, \
                 claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM summary_jobs \
                 WHERE state_id = ANY($3) AND run_at <= NOW() \
                 ORDER BY run_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING id, resource_id, owner_user_id, payload, attempts",
        )
        .bind(JobState::Running.id())
        .bind(worker_id)
        .bind(&claimable[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ClaimedJob {
            descriptor: JobDescriptor {
                id: row.id,
                resource_id: row.resource_id,
                owner_user_id: row.owner_user_id,
                payload: row.payload,
            },
            attempt: row.attempts.max(1) as u32,
        }))
    }

    async fn schedule_retry(
        &self,
        id: JobId,
        run_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE summary_jobs \
             SET state_id = $2, run_at = $3, last_error = $4, \
                 claimed_by = NULL, claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(JobState::RetryScheduled.id())
        .bind(run_at)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Job", id });
        }
        Ok(())
    }

    async fn mark_completed(&self, id: JobId) -> Result<(), StoreError> {
        self.finish(id, JobState::Completed, None).await
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        self.finish(id, JobState::Failed, Some(error)).await
    }

    async fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, StoreError> {
        let cutoff = now - policy.max_age;
        let aged = sqlx::query(
            "DELETE FROM summary_jobs \
             WHERE state_id = ANY($1) AND finished_at < $2",
        )
        .bind(&[JobState::Completed.id(), JobState::Failed.id()][..])
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let completed = self
            .prune_beyond(JobState::Completed, policy.keep_completed)
            .await?;
        let failed = self.prune_beyond(JobState::Failed, policy.keep_failed).await?;

        Ok(aged + completed + failed)
    }
}
