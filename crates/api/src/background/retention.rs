//! Periodic pruning of finished jobs from the queue.
//!
//! The record store keeps the terminal state of every summary, so pruning
//! only bounds the size of the job table.

use std::sync::Arc;
use std::time::Duration;

use recap_core::retry::RetentionPolicy;
use recap_queue::JobQueue;
use tokio_util::sync::CancellationToken;

/// How often the prune pass runs.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Run the job retention loop until `cancel` is triggered.
pub async fn run(
    queue: Arc<JobQueue>,
    retention: RetentionPolicy,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        keep_completed = retention.keep_completed,
        keep_failed = retention.keep_failed,
        max_age_hours = retention.max_age.num_hours(),
        interval_secs = every.as_secs(),
        "Job retention task started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = interval.tick() => {
                match queue.prune(&retention).await {
                    Ok(0) => tracing::debug!("Job retention: nothing to prune"),
                    Ok(pruned) => tracing::info!(pruned, "Job retention: pruned finished jobs"),
                    Err(e) => tracing::error!(error = %e, "Job retention: prune failed"),
                }
            }
        }
    }
}
