//! Frame encoding for event streams.
//!
//! Frames follow the server-sent events format: every frame ends with a
//! blank line, data lines carry one line of JSON, and the keep-alive is a
//! comment line that `EventSource` clients ignore.

use axum::body::Bytes;
use recap_core::events::{ResourceEvent, EVENT_CONNECTED};
use recap_core::status::ResourceStatus;
use recap_core::types::ResourceId;
use serde::Serialize;

/// The keep-alive frame.
pub const KEEP_ALIVE: &str = ": keep-alive\n\n";

#[derive(Serialize)]
struct Connected {
    resource_id: ResourceId,
    status: ResourceStatus,
}

fn encode(name: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {name}\ndata: {data}\n\n"))
}

/// First frame of every stream, carrying the status at subscribe time.
pub fn connected(
    resource_id: ResourceId,
    status: ResourceStatus,
) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(&Connected {
        resource_id,
        status,
    })?;
    Ok(encode(EVENT_CONNECTED, &data))
}

/// A bus event, forwarded verbatim as its JSON form.
pub fn event(event: &ResourceEvent) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(event)?;
    Ok(encode(event.name(), &data))
}

pub fn keep_alive() -> Bytes {
    Bytes::from_static(KEEP_ALIVE.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_frame() {
        let frame = connected(7, ResourceStatus::Pending).unwrap();
        assert_eq!(
            frame,
            "event: connected\ndata: {\"resource_id\":7,\"status\":\"pending\"}\n\n"
        );
    }

    #[test]
    fn event_frame_carries_json() {
        let frame = event(&ResourceEvent::Completed {
            result: serde_json::json!({"summary": "X"}),
        })
        .unwrap();
        assert_eq!(
            frame,
            "event: completed\ndata: {\"type\":\"completed\",\"result\":{\"summary\":\"X\"}}\n\n"
        );
    }

    #[test]
    fn multiline_text_stays_on_one_data_line() {
        let frame = event(&ResourceEvent::Failed {
            error_message: "line one\nline two".into(),
        })
        .unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert_eq!(text.matches('\n').count(), 3);
    }

    #[test]
    fn keep_alive_is_a_comment() {
        assert!(keep_alive().starts_with(b":"));
    }
}
