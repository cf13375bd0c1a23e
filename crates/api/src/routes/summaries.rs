//! Route definitions for summaries and their event streams.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::summaries;
use crate::state::AppState;
use crate::stream::handler as stream;

/// Request/response routes mounted at `/summaries`.
///
/// ```text
/// POST /               -> create_summary
/// GET  /{id}           -> get_summary
/// POST /{id}/retry     -> retry_summary
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(summaries::create_summary))
        .route("/{id}", get(summaries::get_summary))
        .route("/{id}/retry", post(summaries::retry_summary))
}

/// Long-lived event stream routes.
///
/// ```text
/// GET /summaries/{id}/events -> stream_events
/// ```
pub fn stream_router() -> Router<AppState> {
    Router::new().route("/summaries/{id}/events", get(stream::stream_events))
}
