//! The claim loop.
//!
//! Polls the queue every `poll_interval`, draining every due job before
//! sleeping again. Each attempt is reported as `started`; the result is
//! reported before the queue is told, so a crash in between leads to a
//! redelivery rather than a resource stuck in `processing`.
//!
//! Reports are retried with a short backoff. A result whose status write
//! still fails goes back to the queue as a retryable failure, so the job is
//! delivered again instead of being acknowledged with the record left in
//! `processing`.

use std::sync::Arc;
use std::time::Duration;

use recap_core::job::{ClaimedJob, JobOutcome};
use recap_core::retry::RetryPolicy;
use recap_core::types::{JobId, ResourceId};
use recap_queue::{AttemptResult, Disposition, JobQueue, OutcomeReporter, ReportError};
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::handler::JobHandler;

/// Default polling interval for the claim loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Backoff for outcome reports that fail.
fn default_report_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(100),
        multiplier: 2.0,
        max_delay: Duration::from_secs(2),
    }
}

pub struct Executor {
    worker_id: String,
    queue: Arc<JobQueue>,
    reporter: Arc<OutcomeReporter>,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
    report_retry: RetryPolicy,
}

impl Executor {
    pub fn new(
        worker_id: impl Into<String>,
        queue: Arc<JobQueue>,
        reporter: Arc<OutcomeReporter>,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            reporter,
            handler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            report_retry: default_report_retry(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_report_retry(mut self, report_retry: RetryPolicy) -> Self {
        self.report_retry = report_retry;
        self
    }

    /// Run the claim loop until the cancellation token is triggered.
    ///
    /// A job already being handled is finished before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            worker_id = %self.worker_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Executor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker_id = %self.worker_id, "Executor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    while !cancel.is_cancelled() {
                        match self.run_once().await {
                            Ok(true) => continue,
                            Ok(false) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Claim cycle failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Claim and process one job. Returns `false` when nothing was due.
    pub async fn run_once(&self) -> Result<bool, ExecutorError> {
        let Some(job) = self.queue.claim(&self.worker_id).await? else {
            return Ok(false);
        };
        self.process(job).await?;
        Ok(true)
    }

    async fn process(&self, job: ClaimedJob) -> Result<(), ExecutorError> {
        let job_id = job.descriptor.id;
        let resource_id = job.descriptor.resource_id;

        if let Err(e) = self.report(job_id, resource_id, JobOutcome::Started).await {
            if !e.status_written() {
                return self.fail_attempt(job_id, resource_id, report_failure(&e)).await;
            }
            tracing::warn!(job_id, resource_id, error = %e, "Started event lost");
        }

        match self.handler.handle(&job).await {
            Ok(result) => {
                match self
                    .report(job_id, resource_id, JobOutcome::Completed { result })
                    .await
                {
                    Ok(()) => {
                        self.queue.on_result(job_id, AttemptResult::Succeeded).await?;
                    }
                    Err(e) if e.status_written() => {
                        self.queue.on_result(job_id, AttemptResult::Succeeded).await?;
                        return Err(ExecutorError::Report { job_id, source: e });
                    }
                    Err(e) => {
                        return self.fail_attempt(job_id, resource_id, report_failure(&e)).await;
                    }
                }
            }
            Err(e) => {
                let failure = AttemptResult::Failed {
                    error: e.message().to_string(),
                    retryable: e.is_retryable(),
                };
                self.fail_attempt(job_id, resource_id, failure).await?;
            }
        }

        Ok(())
    }

    /// Hand a failed attempt to the queue and report the terminal failure
    /// once retries run out.
    async fn fail_attempt(
        &self,
        job_id: JobId,
        resource_id: ResourceId,
        failure: AttemptResult,
    ) -> Result<(), ExecutorError> {
        let disposition = self.queue.on_result(job_id, failure).await?;
        if let Disposition::Failed { error, .. } = disposition {
            self.report(
                job_id,
                resource_id,
                JobOutcome::Failed {
                    error_message: error,
                },
            )
            .await
            .map_err(|source| ExecutorError::Report { job_id, source })?;
        }
        Ok(())
    }

    /// Report an outcome, retrying with backoff.
    ///
    /// Once the status write has gone through only the publish is retried.
    async fn report(
        &self,
        job_id: JobId,
        resource_id: ResourceId,
        outcome: JobOutcome,
    ) -> Result<(), ReportError> {
        let mut written = false;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = if written {
                self.reporter.republish(resource_id, outcome.clone()).await
            } else {
                self.reporter
                    .report_outcome(job_id, resource_id, outcome.clone())
                    .await
                    .map(|_| ())
            };

            let Err(e) = result else {
                return Ok(());
            };
            written |= e.status_written();
            if !self.report_retry.should_retry(attempt) {
                tracing::error!(job_id, resource_id, attempt, error = %e, "Failed to report outcome");
                return Err(e);
            }
            let delay = self.report_retry.delay_after(attempt);
            tracing::warn!(
                job_id,
                resource_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Outcome report failed, retrying",
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// A report that never reached the record store counts as a retryable
/// failure of the attempt.
fn report_failure(e: &ReportError) -> AttemptResult {
    AttemptResult::Failed {
        error: format!("Failed to report outcome: {e}"),
        retryable: true,
    }
}
