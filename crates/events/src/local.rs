//! In-process channel registry.
//!
//! One `broadcast` channel per resource id, created on first subscribe and
//! removed when its last subscription is released. Publishing to a resource
//! without a channel does nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use recap_core::events::ResourceEvent;
use recap_core::types::ResourceId;
use tokio::sync::broadcast;

use crate::bus::{EventBus, Subscription};
use crate::error::EventBusError;

/// Default buffer capacity of each per-resource channel.
const DEFAULT_CAPACITY: usize = 64;

struct Channel {
    sender: broadcast::Sender<ResourceEvent>,
    subscribers: usize,
}

type Registry = Mutex<HashMap<ResourceId, Channel>>;

/// Lock the registry. Critical sections never panic midway, so a poisoned
/// lock still holds a consistent map.
fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<ResourceId, Channel>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single-process [`EventBus`].
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct LocalEventBus {
    registry: Arc<Registry>,
    capacity: usize,
}

impl LocalEventBus {
    /// Create a bus whose per-resource channels buffer `capacity` events.
    ///
    /// A subscriber more than `capacity` events behind skips the oldest.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Deliver `event` to the current subscribers of `resource_id`.
    ///
    /// Never blocks: the send happens under the registry lock, so two
    /// publishes from one task are seen in the order they were made.
    pub fn send(&self, resource_id: ResourceId, event: ResourceEvent) {
        let registry = lock(&self.registry);
        if let Some(channel) = registry.get(&resource_id) {
            // A send error only means every receiver is already gone.
            let _ = channel.sender.send(event);
        }
    }

    /// Resources that currently have at least one subscriber.
    pub fn channel_count(&self) -> usize {
        lock(&self.registry).len()
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn release(registry: &Weak<Registry>, resource_id: ResourceId) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut registry = lock(&registry);
    if let Some(channel) = registry.get_mut(&resource_id) {
        channel.subscribers = channel.subscribers.saturating_sub(1);
        if channel.subscribers == 0 {
            registry.remove(&resource_id);
            tracing::trace!(resource_id, "Released event channel");
        }
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn publish(
        &self,
        resource_id: ResourceId,
        event: ResourceEvent,
    ) -> Result<(), EventBusError> {
        self.send(resource_id, event);
        Ok(())
    }

    fn subscribe(&self, resource_id: ResourceId) -> Result<Subscription, EventBusError> {
        let receiver = {
            let mut registry = lock(&self.registry);
            let channel = registry.entry(resource_id).or_insert_with(|| Channel {
                sender: broadcast::channel(self.capacity).0,
                subscribers: 0,
            });
            channel.subscribers += 1;
            channel.sender.subscribe()
        };

        let registry = Arc::downgrade(&self.registry);
        Ok(Subscription::new(resource_id, receiver, move || {
            release(&registry, resource_id)
        }))
    }

    fn subscriber_count(&self, resource_id: ResourceId) -> usize {
        lock(&self.registry)
            .get(&resource_id)
            .map_or(0, |channel| channel.subscribers)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn completed(n: i64) -> ResourceEvent {
        ResourceEvent::Completed {
            result: serde_json::json!(n),
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = LocalEventBus::default();
        let mut sub = bus.subscribe(1).unwrap();

        bus.publish(1, ResourceEvent::ProcessingStarted).await.unwrap();
        bus.publish(1, completed(7)).await.unwrap();

        assert_eq!(sub.recv().await, Some(ResourceEvent::ProcessingStarted));
        assert_eq!(sub.recv().await, Some(completed(7)));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = LocalEventBus::default();
        tokio::time::timeout(
            Duration::from_millis(100),
            bus.publish(99, ResourceEvent::ProcessingStarted),
        )
        .await
        .expect("publish must not block")
        .unwrap();
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn events_are_routed_by_resource() {
        let bus = LocalEventBus::default();
        let mut one = bus.subscribe(1).unwrap();
        let mut two = bus.subscribe(2).unwrap();

        bus.publish(2, completed(2)).await.unwrap();
        bus.publish(1, completed(1)).await.unwrap();

        assert_eq!(one.recv().await, Some(completed(1)));
        assert_eq!(two.recv().await, Some(completed(2)));
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let bus = LocalEventBus::default();
        let mut a = bus.subscribe(1).unwrap();
        let mut b = bus.subscribe(1).unwrap();

        bus.publish(1, ResourceEvent::ProcessingStarted).await.unwrap();

        assert_eq!(a.recv().await, Some(ResourceEvent::ProcessingStarted));
        assert_eq!(b.recv().await, Some(ResourceEvent::ProcessingStarted));
    }

    #[test]
    fn dropping_last_subscription_frees_channel() {
        let bus = LocalEventBus::default();
        let a = bus.subscribe(1).unwrap();
        let b = bus.subscribe(1).unwrap();
        assert_eq!(bus.subscriber_count(1), 2);

        drop(a);
        assert_eq!(bus.subscriber_count(1), 1);
        assert_eq!(bus.channel_count(), 1);

        b.release();
        assert_eq!(bus.subscriber_count(1), 0);
        assert_eq!(bus.channel_count(), 0);
    }

    #[test]
    fn subscription_outliving_bus_releases_quietly() {
        let bus = LocalEventBus::default();
        let sub = bus.subscribe(1).unwrap();
        drop(bus);
        drop(sub);
    }
}
