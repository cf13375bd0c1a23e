//! Handler for the caller's quota and live-job usage.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use recap_core::types::Timestamp;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for GET /quota.
#[derive(Debug, Serialize)]
pub struct QuotaStatusResponse {
    /// Jobs counted in the current window.
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    /// When the current window ends.
    pub reset_at: Timestamp,
    /// Jobs queued, running or waiting to retry.
    pub live_jobs: i64,
    pub max_pending: i64,
}

/// GET /api/v1/quota
pub async fn get_quota_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let usage = state.jobs.ledger().get_usage(&auth.caller()).await?;
    let live_jobs = state.jobs.queue().list_live(auth.user_id).await?;

    Ok(Json(DataResponse {
        data: QuotaStatusResponse {
            used: usage.used,
            limit: usage.limit,
            remaining: usage.remaining(),
            reset_at: usage.reset_at,
            live_jobs,
            max_pending: state.config.queue.max_pending_per_user,
        },
    }))
}
