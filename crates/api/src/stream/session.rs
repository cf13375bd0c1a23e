use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use recap_core::types::ResourceId;
use recap_events::Subscription;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::stream::frame;
use crate::stream::manager::StreamManager;

/// Sender half feeding a streaming response body.
pub type FrameSender = mpsc::Sender<Result<Bytes, Infallible>>;

/// One open event stream.
pub struct StreamSession {
    pub id: Uuid,
    pub resource_id: ResourceId,
    pub subscription: Subscription,
    pub sender: FrameSender,
    pub cancel: CancellationToken,
    pub keepalive: Duration,
}

impl StreamSession {
    /// Forward events and keep-alives until the client goes away, the
    /// server cancels the session, or the bus closes the channel.
    ///
    /// On every exit path the subscription is released, the keep-alive
    /// timer dropped and the session deregistered from `manager`.
    pub async fn run(self, manager: Arc<StreamManager>) {
        let id = self.id;
        let resource_id = self.resource_id;

        let reason = self.forward().await;

        manager.remove(id).await;
        tracing::info!(session_id = %id, resource_id, reason, "Event stream closed");
    }

    async fn forward(self) -> &'static str {
        let StreamSession {
            resource_id,
            mut subscription,
            sender,
            cancel,
            keepalive,
            ..
        } = self;

        let mut ticker = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = cancel.cancelled() => break "server shutdown",
                _ = sender.closed() => break "client disconnected",
                received = subscription.recv() => match received {
                    Some(event) => match frame::event(&event) {
                        Ok(bytes) => {
                            if let Err(reason) = deliver(&sender, &cancel, bytes).await {
                                break reason;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(resource_id, error = %e, "Dropping unencodable event");
                        }
                    },
                    None => break "event channel closed",
                },
                _ = ticker.tick() => {
                    if let Err(reason) = deliver(&sender, &cancel, frame::keep_alive()).await {
                        break reason;
                    }
                }
            }
        };

        subscription.release();
        reason
    }
}

/// Queue a frame for the client. A client that stops reading while the
/// buffer is full must not hold off a server-side cancel.
async fn deliver(
    sender: &FrameSender,
    cancel: &CancellationToken,
    bytes: Bytes,
) -> Result<(), &'static str> {
    tokio::select! {
        _ = cancel.cancelled() => Err("server shutdown"),
        sent = sender.send(Ok(bytes)) => sent.map_err(|_| "client disconnected"),
    }
}
