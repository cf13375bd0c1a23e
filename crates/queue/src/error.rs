use recap_core::admission::AdmissionRejection;
use recap_core::types::{DbId, JobId};
use recap_db::StoreError;
use recap_events::EventBusError;

/// Fault inside the queue or its storage.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job {0} not found")]
    UnknownJob(JobId),
}

/// Failure of a [`JobService`](crate::JobService) operation.
///
/// `Rejected`, `NotFound` and `Conflict` are expected outcomes the caller can
/// act on. The rest are infrastructure faults.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] AdmissionRejection),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Failure while recording an executor report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The status write failed; nothing was published.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The status was written but the event could not be published.
    #[error(transparent)]
    Bus(#[from] EventBusError),
}

impl ReportError {
    /// Whether the status write went through before the failure.
    pub fn status_written(&self) -> bool {
        matches!(self, ReportError::Bus(_))
    }
}
