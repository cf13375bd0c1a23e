use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use recap_api::background;
use recap_api::config::ServerConfig;
use recap_api::router::build_app_router;
use recap_api::state::AppState;
use recap_api::stream::StreamManager;
use recap_db::repositories::{PgJobBackend, PgQuotaLedger, PgRecordStore};
use recap_events::PgEventBus;
use recap_queue::{AdmissionController, JobQueue, JobService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recap_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = recap_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    recap_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    recap_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let cancel = CancellationToken::new();

    // --- Event bus ---
    let bus = Arc::new(PgEventBus::new(pool.clone()));
    let listener_handle = {
        let bus = Arc::clone(&bus);
        let cancel = cancel.clone();
        tokio::spawn(async move { bus.run_listener(cancel).await })
    };

    // --- Queue and admission ---
    let records = Arc::new(PgRecordStore::new(pool.clone()));
    let ledger = Arc::new(PgQuotaLedger::new(pool.clone()));
    let queue = Arc::new(JobQueue::new(
        Arc::new(PgJobBackend::new(pool.clone())),
        config.queue.retry_policy(),
    ));
    let admission = Arc::new(AdmissionController::new(
        ledger.clone(),
        Arc::clone(&queue),
        config.queue.max_pending_per_user,
    ));
    let jobs = Arc::new(JobService::new(
        records,
        ledger,
        Arc::clone(&queue),
        admission,
    ));

    let retention_handle = tokio::spawn(background::retention::run(
        Arc::clone(&queue),
        config.queue.retention_policy(),
        background::retention::PRUNE_INTERVAL,
        cancel.clone(),
    ));

    // --- HTTP ---
    let streams = Arc::new(StreamManager::new());
    let state = AppState {
        pool: Some(pool.clone()),
        config: Arc::new(config.clone()),
        jobs,
        bus,
        streams: Arc::clone(&streams),
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    // Event streams never finish on their own, so they are closed as soon as
    // the signal arrives or graceful shutdown would wait on them forever.
    let shutdown = {
        let streams = Arc::clone(&streams);
        async move {
            shutdown_signal().await;
            let closed = streams.shutdown_all().await;
            tracing::info!(closed, "Closed open event streams");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), listener_handle).await;
    tracing::info!("Background tasks stopped");

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
