use std::sync::Arc;

use recap_db::repositories::{PgJobBackend, PgRecordStore};
use recap_events::PgEventBus;
use recap_queue::{JobQueue, OutcomeReporter};
use recap_worker::{Executor, HttpSummarizer, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recap_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(worker_id = %config.worker_id, "Worker starting");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = recap_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    recap_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    let records = Arc::new(PgRecordStore::new(pool.clone()));
    let bus = Arc::new(PgEventBus::new(pool.clone()));
    let queue = Arc::new(JobQueue::new(
        Arc::new(PgJobBackend::new(pool.clone())),
        config.queue.retry_policy(),
    ));
    let reporter = Arc::new(OutcomeReporter::new(records, bus));
    let handler = HttpSummarizer::new(config.summarizer_url.clone(), config.summarizer_timeout)
        .expect("Failed to build summarizer HTTP client");

    let executor = Executor::new(config.worker_id.clone(), queue, reporter, Arc::new(handler))
        .with_poll_interval(config.poll_interval);

    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { executor.run(cancel).await })
    };

    shutdown_signal().await;
    cancel.cancel();
    if let Err(e) = run.await {
        tracing::error!(error = %e, "Executor task panicked");
    }

    pool.close().await;
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
