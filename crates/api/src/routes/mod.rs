pub mod health;
pub mod summaries;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the request/response part of the `/api/v1` tree.
///
/// ```text
/// /summaries                  create (POST)
/// /summaries/{id}             get
/// /summaries/{id}/retry       manual retry of a failed summary (POST)
///
/// /quota                      caller's quota and live-job usage
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/summaries", summaries::router())
        .route("/quota", get(handlers::quota::get_quota_status))
}

/// Build the streaming part of the `/api/v1` tree.
///
/// ```text
/// /summaries/{id}/events      server-sent event stream (GET)
/// ```
pub fn stream_routes() -> Router<AppState> {
    summaries::stream_router()
}
