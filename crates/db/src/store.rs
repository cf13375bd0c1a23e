//! Collaborator contracts consumed by the job pipeline.
//!
//! All three are used as `Arc<dyn ...>` so the API server, the worker and the
//! tests can swap Postgres for the in-memory implementations.

use async_trait::async_trait;
use recap_core::job::{ClaimedJob, JobDescriptor, NewJob};
use recap_core::quota::{Caller, QuotaUsage};
use recap_core::retry::RetentionPolicy;
use recap_core::status::ResourceStatus;
use recap_core::types::{JobId, ResourceId, Timestamp, UserId};

use crate::error::StoreError;
use crate::models::job::JobRecord;
use crate::models::record::{ResourceRecord, StatusUpdate};

/// Summary records and their status field.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record in `pending` status.
    async fn create(
        &self,
        owner_user_id: UserId,
        source: &serde_json::Value,
    ) -> Result<ResourceRecord, StoreError>;

    async fn get(&self, id: ResourceId) -> Result<Option<ResourceRecord>, StoreError>;

    /// Move a record to `status`, overwriting the error and result fields.
    ///
    /// Fails with [`StoreError::InvalidTransition`] when the status machine
    /// does not allow the change.
    async fn set_status(
        &self,
        id: ResourceId,
        status: ResourceStatus,
        update: StatusUpdate,
    ) -> Result<ResourceRecord, StoreError>;
}

/// Per-user rolling job counters.
///
/// The ledger owns all accounting. The admission controller only reads
/// usage; the job service reports each accepted job with `record_job`.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    async fn get_usage(&self, caller: &Caller) -> Result<QuotaUsage, StoreError>;

    /// Count one more job in the caller's current window.
    async fn record_job(&self, caller: &Caller) -> Result<QuotaUsage, StoreError>;
}

/// Durable storage behind the job queue.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Persist a new job, immediately claimable.
    async fn insert(&self, job: &NewJob) -> Result<JobDescriptor, StoreError>;

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Jobs owned by `owner` that are queued, running or waiting to retry.
    async fn count_live_by_owner(&self, owner: UserId) -> Result<i64, StoreError>;

    /// Jobs for `resource` that are queued, running or waiting to retry.
    async fn count_live_by_resource(&self, resource: ResourceId) -> Result<i64, StoreError>;

    /// Hand the oldest due job to `worker_id`, bumping its attempt count.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, StoreError>;

    /// Put a running job back in line, deliverable from `run_at`.
    async fn schedule_retry(
        &self,
        id: JobId,
        run_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError>;

    async fn mark_completed(&self, id: JobId) -> Result<(), StoreError>;

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError>;

    /// Delete finished jobs beyond the retention policy. Returns rows removed.
    async fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, StoreError>;
}
