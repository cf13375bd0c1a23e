use recap_core::types::JobId;
use recap_queue::{QueueError, ReportError};

/// Fault that ends a claim cycle.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// An outcome could not be recorded even after retrying.
    #[error("Failed to report outcome for job {job_id}: {source}")]
    Report {
        job_id: JobId,
        #[source]
        source: ReportError,
    },
}
