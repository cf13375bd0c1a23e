//! The [`EventBus`] contract and the [`Subscription`] handle it returns.

use async_trait::async_trait;
use recap_core::events::ResourceEvent;
use recap_core::types::ResourceId;
use tokio::sync::broadcast;

use crate::error::EventBusError;

/// Routes [`ResourceEvent`]s to everyone subscribed to a resource id.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish `event` to the current subscribers of `resource_id`.
    ///
    /// Returns immediately when nobody is subscribed. Only a transport fault
    /// is an error.
    async fn publish(&self, resource_id: ResourceId, event: ResourceEvent)
        -> Result<(), EventBusError>;

    /// Start receiving events for `resource_id`.
    fn subscribe(&self, resource_id: ResourceId) -> Result<Subscription, EventBusError>;

    /// Live subscriptions for `resource_id`.
    fn subscriber_count(&self, resource_id: ResourceId) -> usize;
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A live subscription to one resource's events.
///
/// The underlying channel slot is released exactly once, when the handle is
/// dropped or [`release`](Subscription::release)d.
pub struct Subscription {
    resource_id: ResourceId,
    receiver: broadcast::Receiver<ResourceEvent>,
    release: Option<ReleaseHook>,
}

impl Subscription {
    /// Wrap a receiver together with the hook that frees its slot.
    pub fn new(
        resource_id: ResourceId,
        receiver: broadcast::Receiver<ResourceEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            resource_id,
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    /// Wait for the next event.
    ///
    /// A subscriber that fell behind skips the overwritten events. Returns
    /// `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<ResourceEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        resource_id = self.resource_id,
                        skipped,
                        "Subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Release the subscription now.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("resource_id", &self.resource_id)
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counted_subscription(released: &Arc<AtomicUsize>) -> Subscription {
        let (_tx, rx) = broadcast::channel(4);
        let released = Arc::clone(released);
        Subscription::new(1, rx, move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn drop_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        drop(counted_subscription(&released));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_release_does_not_repeat_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        counted_subscription(&released).release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recv_returns_none_when_closed() {
        let (tx, rx) = broadcast::channel(4);
        let mut sub = Subscription::new(1, rx, || {});
        drop(tx);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_lagged_events() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::new(1, rx, || {});
        for _ in 0..3 {
            tx.send(ResourceEvent::ProcessingStarted).unwrap();
        }
        tx.send(ResourceEvent::Failed {
            error_message: "x".into(),
        })
        .unwrap();

        assert_eq!(sub.recv().await, Some(ResourceEvent::ProcessingStarted));
        assert_eq!(
            sub.recv().await,
            Some(ResourceEvent::Failed {
                error_message: "x".into()
            })
        );
    }
}
