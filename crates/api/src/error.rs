use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recap_core::admission::AdmissionRejection;
use recap_core::error::CoreError;
use recap_db::StoreError;
use recap_events::EventBusError;
use recap_queue::{QueueError, ServiceError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent
/// `{ "error": ..., "code": ... }` JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `recap_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Admission turned the request away.
    #[error(transparent)]
    Rejected(#[from] AdmissionRejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Bus(#[from] EventBusError),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(rejection) => AppError::Rejected(rejection),
            ServiceError::NotFound { entity, id } => {
                AppError::Core(CoreError::NotFound { entity, id })
            }
            ServiceError::Conflict(msg) => AppError::Core(CoreError::Conflict(msg)),
            ServiceError::Store(e) => AppError::Store(e),
            ServiceError::Queue(e) => AppError::Queue(e),
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            // --- Admission ---
            AppError::Rejected(rejection) => (
                StatusCode::TOO_MANY_REQUESTS,
                rejection.code(),
                rejection.to_string(),
            ),

            // --- Collaborator faults ---
            AppError::Store(err) | AppError::Queue(QueueError::Store(err)) => {
                classify_store_error(err)
            }
            AppError::Queue(err @ QueueError::UnknownJob(_)) => {
                tracing::error!(error = %err, "Queue error");
                internal()
            }
            AppError::Bus(err) => {
                tracing::error!(error = %err, "Event bus error");
                internal()
            }

            // --- HTTP-specific errors ---
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let AppError::Rejected(rejection) = &self {
            body["details"] = json!(rejection);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a storage error into an HTTP status, error code, and message.
///
/// Missing rows map to 404 and refused status changes to 409. Everything
/// else maps to 500 with a sanitized message.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        StoreError::InvalidTransition(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        StoreError::Database(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Storage error");
            internal()
        }
    }
}
