use std::sync::Arc;

use recap_events::EventBus;
use recap_queue::JobService;

use crate::config::ServerConfig;
use crate::stream::StreamManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, absent when running on in-memory
    /// collaborators.
    pub pool: Option<recap_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Submission, retry and ownership-checked reads.
    pub jobs: Arc<JobService>,
    /// Event bus the push gateway subscribes to.
    pub bus: Arc<dyn EventBus>,
    /// Open event streams.
    pub streams: Arc<StreamManager>,
}
