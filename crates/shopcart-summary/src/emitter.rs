//! Live update delivery for subscription queries.
//!
//! Fetch subscribers receive each changed row as it happens. Count
//! subscribers receive `CountChanged` signals merged over a window so a burst
//! of new carts produces one notification.

use std::sync::Arc;
use std::time::Duration;

use shopcart_core::scheduler::Scheduler;
use tokio::sync::mpsc;
use tracing::debug;

use crate::subscription::{Subscription, SubscriptionHandle, Topic};
use crate::summary::{CartSummary, CountChanged, SummaryFilter};

/// Default coalescing window for count notifications.
pub const DEFAULT_COUNT_WINDOW: Duration = Duration::from_millis(250);

/// Raw, uncoalesced count-change signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSignal;

/// Live stream of rows matching a fetch query's filter.
pub type FetchSubscription = Subscription<CartSummary>;

/// Live stream of coalesced count-change notifications.
#[derive(Debug)]
pub struct CountSubscription {
    handle: SubscriptionHandle<CountSignal>,
    receiver: mpsc::UnboundedReceiver<CountChanged>,
}

impl CountSubscription {
    /// Waits for the next coalesced notification. Returns `None` once
    /// cancelled.
    pub async fn recv(&mut self) -> Option<CountChanged> {
        if self.handle.is_cancelled() {
            return None;
        }
        let changed = self.receiver.recv().await?;
        (!self.handle.is_cancelled()).then_some(changed)
    }

    /// Returns the next buffered notification without waiting.
    pub fn try_recv(&mut self) -> Option<CountChanged> {
        if self.handle.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Returns a handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle<CountSignal> {
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

impl Drop for CountSubscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// Registry of fetch and count subscriptions for the summary projection.
pub struct QueryUpdateEmitter {
    fetch: Topic<CartSummary>,
    count: Topic<CountSignal>,
    scheduler: Arc<dyn Scheduler>,
    count_window: Duration,
}

impl std::fmt::Debug for QueryUpdateEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryUpdateEmitter")
            .field("fetch", &self.fetch)
            .field("count", &self.count)
            .field("count_window", &self.count_window)
            .finish_non_exhaustive()
    }
}

impl QueryUpdateEmitter {
    /// Creates an emitter that coalesces count signals over `count_window`
    /// using `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, count_window: Duration) -> Self {
        Self {
            fetch: Topic::new(),
            count: Topic::new(),
            scheduler,
            count_window,
        }
    }

    /// Subscribes to rows whose id matches `filter`.
    pub fn subscribe_fetch(&self, filter: SummaryFilter) -> FetchSubscription {
        self.fetch.subscribe(move |cart_id| filter.matches(cart_id))
    }

    /// Subscribes to coalesced count changes for rows matching `filter`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the coalescing task is
    /// spawned onto the current runtime.
    pub fn subscribe_count(&self, filter: SummaryFilter) -> CountSubscription {
        let raw = self.count.subscribe(move |cart_id| filter.matches(cart_id));
        let handle = raw.handle();
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(coalesce(
            raw,
            sender,
            Arc::clone(&self.scheduler),
            self.count_window,
        ));
        CountSubscription { handle, receiver }
    }

    /// Pushes an updated row to matching fetch subscribers.
    pub fn emit_row(&self, summary: &CartSummary) -> usize {
        self.fetch.emit(&summary.id, summary)
    }

    /// Signals matching count subscribers that `cart_id` changed the count.
    pub fn emit_count_changed(&self, cart_id: &str) -> usize {
        self.count.emit(cart_id, &CountSignal)
    }

    /// Returns the number of live fetch subscriptions.
    #[must_use]
    pub fn fetch_subscriptions(&self) -> usize {
        self.fetch.subscriber_count()
    }

    /// Returns the number of live count subscriptions.
    #[must_use]
    pub fn count_subscriptions(&self) -> usize {
        self.count.subscriber_count()
    }
}

async fn coalesce(
    mut raw: Subscription<CountSignal>,
    sender: mpsc::UnboundedSender<CountChanged>,
    scheduler: Arc<dyn Scheduler>,
    window: Duration,
) {
    while raw.recv().await.is_some() {
        scheduler.wait(window).await;
        let mut coalesced = 1;
        while raw.try_recv().is_some() {
            coalesced += 1;
        }
        if raw.is_cancelled() || sender.send(CountChanged { coalesced }).is_err() {
            break;
        }
        debug!(coalesced, "count change notification sent");
    }
}
