//! The recap executor.
//!
//! Claims jobs from the queue, runs them through a [`JobHandler`], and
//! reports every outcome through the
//! [`OutcomeReporter`](recap_queue::OutcomeReporter).

pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod summarizer;

pub use config::WorkerConfig;
pub use error::ExecutorError;
pub use executor::Executor;
pub use handler::{HandlerError, JobHandler};
pub use summarizer::HttpSummarizer;
