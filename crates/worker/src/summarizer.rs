//! [`JobHandler`] that delegates to an HTTP summarization service.
//!
//! Each attempt posts the job's source to `SUMMARIZER_URL` and takes the
//! JSON response body as the job result.

use std::time::Duration;

use async_trait::async_trait;
use recap_core::job::ClaimedJob;
use reqwest::StatusCode;
use serde::Serialize;

use crate::handler::{HandlerError, JobHandler};

/// Request body sent to the summarizer.
#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    resource_id: i64,
    job_id: i64,
    attempt: u32,
    source: &'a serde_json::Value,
}

pub struct HttpSummarizer {
    client: reqwest::Client,
    url: String,
}

impl HttpSummarizer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Reuse an existing client (and its connection pool).
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

/// Classify a non-success response status.
///
/// Request timeouts and rate limiting are retried; other client errors mean
/// the input is bad.
pub fn classify_status(status: StatusCode, body: &str) -> HandlerError {
    let message = format!("Summarizer returned HTTP {}: {}", status.as_u16(), body.trim());
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        HandlerError::Retryable(message)
    } else {
        HandlerError::Permanent(message)
    }
}

/// Classify a transport-level failure.
fn classify_transport(e: reqwest::Error) -> HandlerError {
    if e.is_builder() {
        HandlerError::Permanent(format!("Invalid summarizer request: {e}"))
    } else {
        HandlerError::Retryable(format!("Summarizer unreachable: {e}"))
    }
}

#[async_trait]
impl JobHandler for HttpSummarizer {
    async fn handle(&self, job: &ClaimedJob) -> Result<serde_json::Value, HandlerError> {
        let request = SummarizeRequest {
            resource_id: job.descriptor.resource_id,
            job_id: job.descriptor.id,
            attempt: job.attempt,
            source: &job.descriptor.payload,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response.json::<serde_json::Value>().await.map_err(|e| {
            if e.is_decode() {
                HandlerError::Permanent(format!("Summarizer returned malformed JSON: {e}"))
            } else {
                classify_transport(e)
            }
        })
    }
}
