use std::collections::HashMap;

use recap_core::types::{ResourceId, Timestamp, UserId};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Metadata for a single open event stream.
pub struct StreamSessionInfo {
    pub resource_id: ResourceId,
    pub user_id: UserId,
    /// Cancelled to close the stream from the server side.
    pub cancel: CancellationToken,
    pub opened_at: Timestamp,
}

/// Tracks every open event stream.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Sessions deregister themselves when their
/// loop ends.
pub struct StreamManager {
    sessions: RwLock<HashMap<Uuid, StreamSessionInfo>>,
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session and return its id and cancellation token.
    pub async fn open(
        &self,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let info = StreamSessionInfo {
            resource_id,
            user_id,
            cancel: cancel.clone(),
            opened_at: chrono::Utc::now(),
        };
        self.sessions.write().await.insert(id, info);
        (id, cancel)
    }

    /// Deregister a session. Returns `false` if it was already gone.
    pub async fn remove(&self, id: Uuid) -> bool {
        let Some(info) = self.sessions.write().await.remove(&id) else {
            return false;
        };
        let open_for = chrono::Utc::now() - info.opened_at;
        tracing::debug!(
            session_id = %id,
            resource_id = info.resource_id,
            user_id = info.user_id,
            open_secs = open_for.num_seconds(),
            "Event stream deregistered",
        );
        true
    }

    /// Return the current number of open streams.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Open streams watching `resource_id`.
    pub async fn sessions_for(&self, resource_id: ResourceId) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|info| info.resource_id == resource_id)
            .count()
    }

    /// Ask every open stream to close. Returns how many were signalled.
    ///
    /// Used during graceful shutdown; open streams would otherwise keep the
    /// server draining forever.
    pub async fn shutdown_all(&self) -> usize {
        let sessions = self.sessions.read().await;
        for info in sessions.values() {
            info.cancel.cancel();
        }
        tracing::info!(count = sessions.len(), "Closing all event streams");
        sessions.len()
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}
