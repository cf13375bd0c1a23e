//! Job admission, the durable job queue, and the executor reporting path.
//!
//! - [`AdmissionController`]: quota and pending-cap gate, read-only.
//! - [`JobQueue`]: enqueue, delivery, automatic retry with backoff, pruning.
//! - [`JobService`]: what request handlers call: submit and manual retry.
//! - [`OutcomeReporter`]: executor reports: status write, then publish.
//!
//! Nothing here is global. Each piece is constructed with its collaborators
//! and shared through `Arc`.

pub mod admission;
pub mod config;
pub mod error;
pub mod queue;
pub mod reporter;
pub mod service;

pub use admission::{AdmissionController, AdmissionDecision};
pub use config::QueueSettings;
pub use error::{QueueError, ReportError, ServiceError};
pub use queue::{AttemptResult, Disposition, JobQueue};
pub use reporter::OutcomeReporter;
pub use service::{JobService, RetryOutcome, Submission};
