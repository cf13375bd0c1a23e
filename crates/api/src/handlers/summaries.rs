//! Handlers for summary submission, lookup and manual retry.
//!
//! Every handler is scoped to the authenticated caller: summaries owned by
//! someone else are reported as missing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use recap_core::error::CoreError;
use recap_core::types::{JobId, ResourceId};
use recap_db::models::record::ResourceRecord;
use recap_queue::{RetryOutcome, Submission};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest accepted video URL.
const MAX_URL_LEN: usize = 2048;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /summaries.
#[derive(Debug, Deserialize)]
pub struct CreateSummary {
    /// Video to summarize.
    pub url: String,
    /// Preferred summary language, e.g. `en` or `pt-BR`.
    pub language: Option<String>,
}

impl CreateSummary {
    fn validate(&self) -> Result<(), CoreError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(CoreError::Validation("url is required".into()));
        }
        if url.len() > MAX_URL_LEN {
            return Err(CoreError::Validation(format!(
                "url must be at most {MAX_URL_LEN} characters"
            )));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CoreError::Validation(
                "url must start with http:// or https://".into(),
            ));
        }
        if let Some(language) = &self.language {
            let valid = (2..=16).contains(&language.len())
                && language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(CoreError::Validation(format!(
                    "'{language}' is not a valid language tag"
                )));
            }
        }
        Ok(())
    }

    /// The job payload handed to the summarizer.
    fn into_source(self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url.trim(),
            "language": self.language,
        })
    }
}

/// A summary together with the job that will process it.
#[derive(Debug, Serialize)]
pub struct QueuedSummary {
    pub summary: ResourceRecord,
    pub job_id: JobId,
}

impl From<Submission> for QueuedSummary {
    fn from(submission: Submission) -> Self {
        Self {
            summary: submission.record,
            job_id: submission.job.id,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/summaries
///
/// Admit and queue a new summary. Returns 201 with the `pending` record, or
/// 429 when the caller's quota or pending-job cap is exhausted.
pub async fn create_summary(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateSummary>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let submission = state.jobs.submit(&auth.caller(), input.into_source()).await?;

    tracing::info!(
        resource_id = submission.record.id,
        job_id = submission.job.id,
        user_id = auth.user_id,
        "Summary queued",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: QueuedSummary::from(submission),
        }),
    ))
}

/// GET /api/v1/summaries/{id}
pub async fn get_summary(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> AppResult<impl IntoResponse> {
    let record = state.jobs.get(&auth.caller(), id).await?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/summaries/{id}/retry
///
/// Requeue a failed summary. Returns 202 when requeued, 409 when the summary
/// is not `failed`, and 429 when admission refuses (the summary stays
/// `failed` with its previous error).
pub async fn retry_summary(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> AppResult<impl IntoResponse> {
    match state.jobs.retry(&auth.caller(), id).await? {
        RetryOutcome::Requeued { record, job } => Ok((
            StatusCode::ACCEPTED,
            Json(DataResponse {
                data: QueuedSummary {
                    summary: record,
                    job_id: job.id,
                },
            }),
        )),
        RetryOutcome::RolledBack { reason, .. } => Err(AppError::Rejected(reason)),
    }
}
