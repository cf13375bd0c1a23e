use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use recap_core::types::ResourceId;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::stream::frame;
use crate::stream::session::StreamSession;

/// Frames buffered per stream before the session waits on the client.
const FRAME_BUFFER: usize = 32;

/// GET /api/v1/summaries/{id}/events
///
/// Open an event stream for a summary the caller owns. The subscription is
/// taken before the response is returned; the stream opens with a
/// `connected` frame carrying the current status, so a client can tell
/// whether it already missed the terminal event.
pub async fn stream_events(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<ResourceId>,
) -> AppResult<Response> {
    let record = state.jobs.get(&auth.caller(), resource_id).await?;
    let subscription = state.bus.subscribe(resource_id)?;

    let (sender, receiver) = mpsc::channel(FRAME_BUFFER);
    let connected = frame::connected(resource_id, record.status)
        .map_err(|e| AppError::InternalError(format!("Failed to encode frame: {e}")))?;
    sender
        .try_send(Ok(connected))
        .map_err(|_| AppError::InternalError("Event stream buffer unavailable".into()))?;

    let (session_id, cancel) = state.streams.open(resource_id, auth.user_id).await;
    tracing::info!(
        session_id = %session_id,
        resource_id,
        user_id = auth.user_id,
        "Event stream opened",
    );

    let session = StreamSession {
        id: session_id,
        resource_id,
        subscription,
        sender,
        cancel,
        keepalive: state.config.stream_keepalive,
    };
    tokio::spawn(session.run(Arc::clone(&state.streams)));

    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReceiverStream::new(receiver)),
    )
        .into_response())
}
