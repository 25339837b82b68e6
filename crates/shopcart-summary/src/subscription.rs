//! Generic subscribe-with-predicate registry.
//!
//! A [`Topic`] holds live subscribers, each with a predicate over the key of
//! an emitted update. Emission and cancellation take the same lock, so once
//! [`SubscriptionHandle::cancel`] returns no further update reaches that
//! subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct Subscriber<U> {
    predicate: Predicate,
    sender: mpsc::UnboundedSender<U>,
}

struct Registry<U> {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber<U>>,
}

fn lock<U>(registry: &Mutex<Registry<U>>) -> MutexGuard<'_, Registry<U>> {
    // The registry is only a map of senders; it stays consistent even if a
    // holder panicked.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A registry of subscribers for one kind of update.
pub struct Topic<U> {
    registry: Arc<Mutex<Registry<U>>>,
}

impl<U> Default for Topic<U> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }
}

impl<U> std::fmt::Debug for Topic<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<U> Topic<U> {
    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }
}

impl<U: Clone + Send + 'static> Topic<U> {
    /// Creates an empty topic.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber that receives every update whose key satisfies
    /// `predicate`.
    pub fn subscribe<P>(&self, predicate: P) -> Subscription<U>
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(
            id,
            Subscriber {
                predicate: Box::new(predicate),
                sender,
            },
        );

        Subscription {
            handle: SubscriptionHandle {
                id,
                cancelled: Arc::new(AtomicBool::new(false)),
                registry: Arc::downgrade(&self.registry),
            },
            receiver,
        }
    }

    /// Delivers `update` to every subscriber whose predicate accepts `key`.
    /// Returns the number of subscribers it was delivered to.
    pub fn emit(&self, key: &str, update: &U) -> usize {
        let mut registry = lock(&self.registry);
        let mut delivered = 0;
        registry.subscribers.retain(|_, subscriber| {
            if !(subscriber.predicate)(key) {
                return true;
            }
            if subscriber.sender.send(update.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });
        delivered
    }
}

/// Cancels a subscription. Cloneable so the owner of a subscription's
/// update stream and the owner of its lifetime can differ.
pub struct SubscriptionHandle<U> {
    id: u64,
    cancelled: Arc<AtomicBool>,
    registry: Weak<Mutex<Registry<U>>>,
}

impl<U> Clone for SubscriptionHandle<U> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cancelled: Arc::clone(&self.cancelled),
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<U> std::fmt::Debug for SubscriptionHandle<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl<U> SubscriptionHandle<U> {
    /// Removes the subscription from its topic. Idempotent.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).subscribers.remove(&self.id);
        }
    }

    /// Returns `true` once the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A live subscription: a cancel handle plus the stream of updates.
///
/// Dropping the subscription cancels it.
pub struct Subscription<U> {
    handle: SubscriptionHandle<U>,
    receiver: mpsc::UnboundedReceiver<U>,
}

impl<U> std::fmt::Debug for Subscription<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<U> Subscription<U> {
    /// Waits for the next update. Returns `None` once cancelled.
    pub async fn recv(&mut self) -> Option<U> {
        if self.handle.is_cancelled() {
            return None;
        }
        let update = self.receiver.recv().await?;
        (!self.handle.is_cancelled()).then_some(update)
    }

    /// Returns the next buffered update without waiting.
    pub fn try_recv(&mut self) -> Option<U> {
        if self.handle.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Returns a handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle<U> {
        self.handle.clone()
    }

    /// Cancels the subscription. Idempotent.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Returns `true` once the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

impl<U> Drop for Subscription<U> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_only_matching_subscribers() {
        // Arrange
        let topic: Topic<String> = Topic::new();
        let mut c1 = topic.subscribe(|key| key.starts_with("C1"));
        let mut c2 = topic.subscribe(|key| key.starts_with("C2"));

        // Act
        let delivered = topic.emit("C1", &"row".to_owned());

        // Assert
        assert_eq!(delivered, 1);
        assert_eq!(c1.recv().await, Some("row".to_owned()));
        assert_eq!(c2.try_recv(), None);
    }

    #[tokio::test]
    async fn test_cancel_stops_further_delivery() {
        // Arrange
        let topic: Topic<u32> = Topic::new();
        let mut subscription = topic.subscribe(|_| true);
        topic.emit("C1", &1);

        // Act
        subscription.cancel();
        let delivered = topic.emit("C1", &2);

        // Assert
        assert_eq!(delivered, 0);
        assert_eq!(topic.subscriber_count(), 0);
        assert_eq!(subscription.recv().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_from_another_task_cuts_off_concurrent_emission() {
        // Arrange
        let topic: Arc<Topic<u64>> = Arc::new(Topic::new());
        let mut subscription = topic.subscribe(|_| true);
        let handle = subscription.handle();
        let cancel_returned = Arc::new(AtomicBool::new(false));

        let emitter = tokio::spawn({
            let topic = Arc::clone(&topic);
            let cancel_returned = Arc::clone(&cancel_returned);
            async move {
                let mut late_emits = 0;
                let mut late_deliveries = 0;
                let mut n = 0_u64;
                while late_emits < 200 {
                    let after_cancel = cancel_returned.load(Ordering::SeqCst);
                    let delivered = topic.emit("C1", &n);
                    if after_cancel {
                        late_emits += 1;
                        late_deliveries += delivered;
                    }
                    n += 1;
                    tokio::task::yield_now().await;
                }
                late_deliveries
            }
        });

        // Act
        assert!(subscription.recv().await.is_some());
        let canceller = tokio::spawn({
            let cancel_returned = Arc::clone(&cancel_returned);
            async move {
                handle.cancel();
                cancel_returned.store(true, Ordering::SeqCst);
            }
        });
        canceller.await.unwrap();
        let late_deliveries = emitter.await.unwrap();

        // Assert
        assert_eq!(late_deliveries, 0);
        assert_eq!(subscription.recv().await, None);
        assert_eq!(subscription.try_recv(), None);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let topic: Topic<u32> = Topic::new();
        let subscription = topic.subscribe(|_| true);
        let handle = subscription.handle();

        handle.cancel();
        handle.cancel();
        subscription.cancel();

        assert!(subscription.is_cancelled());
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_cancels_subscription() {
        let topic: Topic<u32> = Topic::new();
        let subscription = topic.subscribe(|_| true);
        let handle = subscription.handle();

        drop(subscription);

        assert!(handle.is_cancelled());
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_handle_outliving_topic_cancels_without_panicking() {
        let topic: Topic<u32> = Topic::new();
        let subscription = topic.subscribe(|_| true);
        let handle = subscription.handle();

        drop(topic);
        handle.cancel();

        assert!(handle.is_cancelled());
    }
}
