//! Shared fixtures for queue integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recap_core::job::{ClaimedJob, JobDescriptor, NewJob};
use recap_core::retry::{RetentionPolicy, RetryPolicy};
use recap_core::types::{JobId, ResourceId, Timestamp, UserId};
use recap_db::memory::{MemoryJobBackend, MemoryQuotaLedger, MemoryRecordStore};
use recap_db::models::job::JobRecord;
use recap_db::{JobBackend, StoreError};
use recap_events::LocalEventBus;
use recap_queue::{AdmissionController, JobQueue, JobService, OutcomeReporter};

/// A fully wired pipeline over in-memory collaborators.
pub struct Harness {
    pub records: Arc<MemoryRecordStore>,
    pub ledger: Arc<MemoryQuotaLedger>,
    pub queue: Arc<JobQueue>,
    pub bus: Arc<LocalEventBus>,
    pub service: Arc<JobService>,
    pub reporter: OutcomeReporter,
}

pub fn instant_retries() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub struct HarnessBuilder {
    backend: Arc<dyn JobBackend>,
    ledger: Arc<MemoryQuotaLedger>,
    max_pending: i64,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(MemoryJobBackend::new()),
            ledger: Arc::new(MemoryQuotaLedger::new()),
            max_pending: 25,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn JobBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn quota_window(mut self, window: chrono::Duration) -> Self {
        self.ledger = Arc::new(MemoryQuotaLedger::with_window(window));
        self
    }

    pub fn max_pending(mut self, max_pending: i64) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn build(self) -> Harness {
        let records = Arc::new(MemoryRecordStore::new());
        let bus = Arc::new(LocalEventBus::default());
        let queue = Arc::new(JobQueue::new(self.backend, instant_retries()));
        let admission = Arc::new(AdmissionController::new(
            self.ledger.clone(),
            queue.clone(),
            self.max_pending,
        ));
        let service = Arc::new(JobService::new(
            records.clone(),
            self.ledger.clone(),
            queue.clone(),
            admission,
        ));
        let reporter = OutcomeReporter::new(records.clone(), bus.clone());
        Harness {
            records,
            ledger: self.ledger,
            queue,
            bus,
            service,
            reporter,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}

pub fn video(n: i64) -> serde_json::Value {
    serde_json::json!({ "url": format!("https://www.youtube.com/watch?v=video{n}") })
}

/// A backend whose inserts or live counts can be switched to fail;
/// everything else is delegated.
pub struct FaultyBackend {
    inner: MemoryJobBackend,
    inserts_fail: AtomicBool,
    counts_fail: AtomicBool,
}

impl FaultyBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryJobBackend::new(),
            inserts_fail: AtomicBool::new(false),
            counts_fail: AtomicBool::new(false),
        }
    }

    /// A backend that refuses every insert from the start.
    pub fn broken_inserts() -> Self {
        let backend = Self::new();
        backend.fail_inserts(true);
        backend
    }

    pub fn fail_inserts(&self, on: bool) {
        self.inserts_fail.store(on, Ordering::SeqCst);
    }

    pub fn fail_counts(&self, on: bool) {
        self.counts_fail.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobBackend for FaultyBackend {
    async fn insert(&self, job: &NewJob) -> Result<JobDescriptor, StoreError> {
        if self.inserts_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("queue table unavailable".into()));
        }
        self.inner.insert(job).await
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn count_live_by_owner(&self, owner: UserId) -> Result<i64, StoreError> {
        if self.counts_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("queue table unavailable".into()));
        }
        self.inner.count_live_by_owner(owner).await
    }
    async fn count_live_by_resource(&self, resource: ResourceId) -> Result<i64, StoreError> {
        self.inner.count_live_by_resource(resource).await
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, StoreError> {
        self.inner.claim_next(worker_id).await
    }

    async fn schedule_retry(
        &self,
        id: JobId,
        run_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError> {
        self.inner.schedule_retry(id, run_at, error).await
    }

    async fn mark_completed(&self, id: JobId) -> Result<(), StoreError> {
        self.inner.mark_completed(id).await
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        self.inner.mark_failed(id, error).await
    }

    async fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, StoreError> {
        self.inner.prune(policy, now).await
    }
}
