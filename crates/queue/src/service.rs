//! Job submission and manual retry, as used by request handlers.
//!
//! Both operations write the record store optimistically and compensate when
//! a later step fails, so a resource never sits in `pending` without a live
//! job behind it.

use std::sync::Arc;

use recap_core::admission::AdmissionRejection;
use recap_core::job::{JobDescriptor, NewJob};
use recap_core::quota::Caller;
use recap_core::status::ResourceStatus;
use recap_core::types::ResourceId;
use recap_db::models::record::{ResourceRecord, StatusUpdate};
use recap_db::{QuotaLedger, RecordStore, StoreError};

use crate::admission::{AdmissionController, AdmissionDecision};
use crate::error::ServiceError;
use crate::queue::JobQueue;

/// Message left on a record whose job could not be queued.
pub const ENQUEUE_FAILED_MESSAGE: &str = "The summary could not be queued, please retry";

/// An accepted job request.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub record: ResourceRecord,
    pub job: JobDescriptor,
}

/// Result of a manual retry that did not fault.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// The record is `pending` again with exactly one live job.
    Requeued {
        record: ResourceRecord,
        job: JobDescriptor,
    },
    /// Admission refused the retry; the record is back to `failed` with its
    /// previous error.
    RolledBack {
        record: ResourceRecord,
        reason: AdmissionRejection,
    },
}

pub struct JobService {
    records: Arc<dyn RecordStore>,
    ledger: Arc<dyn QuotaLedger>,
    queue: Arc<JobQueue>,
    admission: Arc<AdmissionController>,
}

impl JobService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn QuotaLedger>,
        queue: Arc<JobQueue>,
        admission: Arc<AdmissionController>,
    ) -> Self {
        Self {
            records,
            ledger,
            queue,
            admission,
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn ledger(&self) -> &Arc<dyn QuotaLedger> {
        &self.ledger
    }

    /// Fetch a record owned by `caller`. Records of other users are reported
    /// as missing.
    pub async fn get(
        &self,
        caller: &Caller,
        resource_id: ResourceId,
    ) -> Result<ResourceRecord, ServiceError> {
        match self.records.get(resource_id).await? {
            Some(record) if record.owner_user_id == caller.user_id => Ok(record),
            _ => Err(ServiceError::NotFound {
                entity: "Summary",
                id: resource_id,
            }),
        }
    }

    /// Admit, create a `pending` record, enqueue its job and count it
    /// against the caller's quota.
    pub async fn submit(
        &self,
        caller: &Caller,
        source: serde_json::Value,
    ) -> Result<Submission, ServiceError> {
        if let AdmissionDecision::Rejected(reason) = self.admission.try_admit(caller).await? {
            return Err(reason.into());
        }

        let record = self.records.create(caller.user_id, &source).await?;
        let job = match self.queue.enqueue(new_job(&record)).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(
                    resource_id = record.id,
                    error = %e,
                    "Enqueue failed, marking summary failed",
                );
                self.compensate(record.id, Some(ENQUEUE_FAILED_MESSAGE.to_string()))
                    .await;
                return Err(e.into());
            }
        };

        self.count_job(caller).await;
        Ok(Submission { record, job })
    }

    /// Two-phase manual retry of a `failed` record.
    ///
    /// The record is reset to `pending` first. If admission then refuses,
    /// it is rolled back to `failed` and [`RetryOutcome::RolledBack`] is
    /// returned. Records that are not `failed` are a conflict.
    pub async fn retry(
        &self,
        caller: &Caller,
        resource_id: ResourceId,
    ) -> Result<RetryOutcome, ServiceError> {
        let record = self.get(caller, resource_id).await?;
        if record.status != ResourceStatus::Failed {
            return Err(ServiceError::Conflict(format!(
                "Summary {resource_id} is {}, only failed summaries can be retried",
                record.status
            )));
        }
        let previous_error = record.error_message;

        let pending = self
            .records
            .set_status(resource_id, ResourceStatus::Pending, StatusUpdate::default())
            .await
            .map_err(conflict_on_transition)?;

        match self.admission.try_admit(caller).await {
            Ok(AdmissionDecision::Admitted { .. }) => {}
            Ok(AdmissionDecision::Rejected(reason)) => {
                let record = self
                    .records
                    .set_status(
                        resource_id,
                        ResourceStatus::Failed,
                        StatusUpdate {
                            error_message: previous_error,
                            result: None,
                        },
                    )
                    .await?;
                tracing::info!(
                    resource_id,
                    user_id = caller.user_id,
                    code = reason.code(),
                    "Retry refused, rolled back to failed",
                );
                return Ok(RetryOutcome::RolledBack { record, reason });
            }
            Err(e) => {
                self.compensate(resource_id, previous_error).await;
                return Err(e.into());
            }
        }

        let job = match self.queue.enqueue(new_job(&pending)).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(resource_id, error = %e, "Enqueue failed during retry");
                self.compensate(resource_id, previous_error).await;
                return Err(e.into());
            }
        };

        self.count_job(caller).await;
        tracing::info!(resource_id, job_id = job.id, "Summary requeued");
        Ok(RetryOutcome::Requeued {
            record: pending,
            job,
        })
    }

    /// Move a `pending` record back to `failed` after a fault.
    async fn compensate(&self, resource_id: ResourceId, error_message: Option<String>) {
        let update = StatusUpdate {
            error_message,
            result: None,
        };
        if let Err(e) = self
            .records
            .set_status(resource_id, ResourceStatus::Failed, update)
            .await
        {
            tracing::error!(
                resource_id,
                error = %e,
                "Compensating status write failed, record left pending",
            );
        }
    }

    /// Count an enqueued job against the caller's quota.
    ///
    /// The job is already live at this point, so a ledger fault is logged
    /// rather than failing the request.
    async fn count_job(&self, caller: &Caller) {
        match self.ledger.record_job(caller).await {
            Ok(usage) => {
                tracing::debug!(
                    user_id = caller.user_id,
                    used = usage.used,
                    limit = usage.limit,
                    "Quota usage recorded",
                );
            }
            Err(e) => {
                tracing::error!(user_id = caller.user_id, error = %e, "Failed to record quota usage");
            }
        }
    }
}

fn new_job(record: &ResourceRecord) -> NewJob {
    NewJob {
        resource_id: record.id,
        owner_user_id: record.owner_user_id,
        payload: record.source.clone(),
    }
}

fn conflict_on_transition(e: StoreError) -> ServiceError {
    match e {
        StoreError::InvalidTransition(message) => ServiceError::Conflict(message),
        other => other.into(),
    }
}
