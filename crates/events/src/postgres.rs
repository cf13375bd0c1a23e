//! Multi-process event bus over Postgres `LISTEN/NOTIFY`.
//!
//! [`PgEventBus::publish`] sends the event with `pg_notify`; every process
//! running [`PgEventBus::run_listener`] receives it and re-publishes into its
//! own [`LocalEventBus`], where the subscriptions live. NOTIFY keeps the
//! per-session order of a publisher and drops notifications nobody listens
//! for, which matches the in-process semantics.

use std::time::Duration;

use async_trait::async_trait;
use recap_core::events::ResourceEvent;
use recap_core::retry::RetryPolicy;
use recap_core::types::ResourceId;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::bus::{EventBus, Subscription};
use crate::error::EventBusError;
use crate::local::LocalEventBus;

/// Postgres channel name all recap events are sent on.
pub const NOTIFY_CHANNEL: &str = "recap_resource_events";

/// Largest payload sent as-is. Postgres refuses NOTIFY payloads of 8000
/// bytes or more.
pub const MAX_NOTIFY_PAYLOAD: usize = 7900;

/// What travels over the NOTIFY channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Envelope {
    resource_id: ResourceId,
    event: ResourceEvent,
}

/// Encode an envelope small enough for NOTIFY.
///
/// An oversized event keeps its type but loses its body: results become
/// `null` and text fields are cut, by half again on each pass, until the
/// escaped JSON fits. Clients fetch the record to read the full state.
fn encode(resource_id: ResourceId, event: ResourceEvent) -> Result<String, EventBusError> {
    let payload = serde_json::to_string(&Envelope { resource_id, event: event.clone() })?;
    if payload.len() <= MAX_NOTIFY_PAYLOAD {
        return Ok(payload);
    }

    let mut budget = MAX_NOTIFY_PAYLOAD / 2;
    loop {
        let trimmed = trim(&event, budget);
        let shrunk = serde_json::to_string(&Envelope {
            resource_id,
            event: trimmed,
        })?;
        if shrunk.len() <= MAX_NOTIFY_PAYLOAD || budget == 0 {
            tracing::warn!(
                resource_id,
                event = event.name(),
                size = payload.len(),
                sent = shrunk.len(),
                "Event payload too large for NOTIFY, sending trimmed body"
            );
            return Ok(shrunk);
        }
        budget /= 2;
    }
}

/// `event` with results dropped and text cut to `max_bytes`.
fn trim(event: &ResourceEvent, max_bytes: usize) -> ResourceEvent {
    match event {
        ResourceEvent::ProcessingStarted => ResourceEvent::ProcessingStarted,
        ResourceEvent::Completed { .. } => ResourceEvent::Completed {
            result: serde_json::Value::Null,
        },
        ResourceEvent::Failed { error_message } => ResourceEvent::Failed {
            error_message: truncate(error_message, max_bytes),
        },
        ResourceEvent::SecondaryTaskStarted { task } => ResourceEvent::SecondaryTaskStarted {
            task: truncate(task, max_bytes),
        },
        ResourceEvent::SecondaryTaskCompleted { task, .. } => {
            ResourceEvent::SecondaryTaskCompleted {
                task: truncate(task, max_bytes),
                result: serde_json::Value::Null,
            }
        }
        ResourceEvent::SecondaryTaskFailed { task, error_message } => {
            ResourceEvent::SecondaryTaskFailed {
                task: truncate(task, max_bytes),
                error_message: truncate(error_message, max_bytes),
            }
        }
    }
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// [`EventBus`] shared between processes through Postgres.
#[derive(Clone)]
pub struct PgEventBus {
    pool: PgPool,
    local: LocalEventBus,
    reconnect: RetryPolicy,
}

impl PgEventBus {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            local: LocalEventBus::default(),
            reconnect: RetryPolicy {
                max_attempts: u32::MAX,
                base_delay: Duration::from_secs(1),
                multiplier: 2.0,
                max_delay: Duration::from_secs(30),
            },
        }
    }

    /// Forward notifications into the local registry until `cancel` fires.
    ///
    /// Connection failures are retried with exponential backoff. Events
    /// published while the listener is disconnected are lost.
    pub async fn run_listener(&self, cancel: CancellationToken) {
        let mut failures = 0u32;

        loop {
            let mut listener = match self.connect().await {
                Ok(listener) => {
                    tracing::info!(channel = NOTIFY_CHANNEL, "Event listener connected");
                    failures = 0;
                    listener
                }
                Err(e) => {
                    failures += 1;
                    let delay = self.reconnect.delay_after(failures);
                    tracing::warn!(
                        error = %e,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Event listener connect failed, retrying",
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Event listener stopped");
                        return;
                    }
                    received = listener.recv() => match received {
                        Ok(notification) => self.forward(notification.payload()),
                        Err(e) => {
                            tracing::warn!(error = %e, "Event listener lost connection");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Event listener stopped");
    }

    async fn connect(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        Ok(listener)
    }

    fn forward(&self, payload: &str) {
        match serde_json::from_str::<Envelope>(payload) {
            Ok(envelope) => self.local.send(envelope.resource_id, envelope.event),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed event notification");
            }
        }
    }
}

#[async_trait]
impl EventBus for PgEventBus {
    async fn publish(
        &self,
        resource_id: ResourceId,
        event: ResourceEvent,
    ) -> Result<(), EventBusError> {
        let payload = encode(resource_id, event)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn subscribe(&self, resource_id: ResourceId) -> Result<Subscription, EventBusError> {
        self.local.subscribe(resource_id)
    }

    fn subscriber_count(&self, resource_id: ResourceId) -> usize {
        self.local.subscriber_count(resource_id)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn small_events_are_sent_verbatim() {
        let event = ResourceEvent::Completed {
            result: serde_json::json!({"summary": "short"}),
        };
        let payload = encode(5, event.clone()).unwrap();
        let envelope: Envelope = serde_json::from_str(&payload).unwrap();
        assert_eq!(envelope, Envelope { resource_id: 5, event });
    }

    #[test]
    fn oversized_result_is_dropped() {
        let event = ResourceEvent::Completed {
            result: serde_json::json!({"summary": "x".repeat(10_000)}),
        };
        let payload = encode(5, event).unwrap();
        assert!(payload.len() <= MAX_NOTIFY_PAYLOAD);

        let envelope: Envelope = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            envelope.event,
            ResourceEvent::Completed {
                result: serde_json::Value::Null
            }
        );
    }

    #[test]
    fn oversized_error_is_truncated() {
        let event = ResourceEvent::Failed {
            error_message: "é".repeat(6_000),
        };
        let payload = encode(5, event).unwrap();
        assert!(payload.len() <= MAX_NOTIFY_PAYLOAD);
    }

    fn event_type(payload: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        value["event"]["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn escaped_error_is_cut_until_it_fits() {
        for text in ["\"".repeat(6_000), "\u{1}".repeat(3_000), "\\".repeat(7_000)] {
            let payload = encode(5, ResourceEvent::Failed { error_message: text }).unwrap();
            assert!(payload.len() <= MAX_NOTIFY_PAYLOAD, "{} bytes", payload.len());

            let envelope: Envelope = serde_json::from_str(&payload).unwrap();
            assert_matches!(envelope.event, ResourceEvent::Failed { .. });
        }
    }

    #[test]
    fn long_task_name_is_cut() {
        let event = ResourceEvent::SecondaryTaskStarted {
            task: "a".repeat(9_000),
        };
        let payload = encode(5, event).unwrap();
        assert!(payload.len() <= MAX_NOTIFY_PAYLOAD);
        assert_eq!(event_type(&payload), "secondary-task-started");
    }

    #[test]
    fn secondary_failure_with_escaped_task_and_error_fits() {
        let event = ResourceEvent::SecondaryTaskFailed {
            task: "\n".repeat(4_000),
            error_message: "\u{7}".repeat(4_000),
        };
        let payload = encode(5, event).unwrap();
        assert!(payload.len() <= MAX_NOTIFY_PAYLOAD);
        assert_eq!(event_type(&payload), "secondary-task-failed");
    }
}
