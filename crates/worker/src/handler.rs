use async_trait::async_trait;
use recap_core::job::ClaimedJob;

/// Why a job attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Worth another attempt: network trouble, timeouts, upstream 5xx.
    #[error("{0}")]
    Retryable(String),

    /// Another attempt would fail the same way: bad input, upstream 4xx.
    #[error("{0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }

    pub fn message(&self) -> &str {
        match self {
            HandlerError::Retryable(message) | HandlerError::Permanent(message) => message,
        }
    }
}

/// Does the actual work of a job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process one attempt of `job`, returning the result payload.
    async fn handle(&self, job: &ClaimedJob) -> Result<serde_json::Value, HandlerError>;
}
