//! Manual scheduler that lets tests decide when a coalescing window closes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shopcart_core::scheduler::Scheduler;
use tokio::sync::Semaphore;

/// A scheduler whose windows only close when the test calls `advance`.
///
/// Each `advance` releases exactly one pending (or future) `wait`.
#[derive(Debug)]
pub struct ManualScheduler {
    permits: Semaphore,
    waiting: AtomicUsize,
}

impl ManualScheduler {
    /// Creates a scheduler with no windows released.
    #[must_use]
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Closes one coalescing window.
    pub fn advance(&self) {
        self.permits.add_permits(1);
    }

    /// Returns how many `wait` calls are currently blocked.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Yields to the runtime until at least `count` waits are blocked.
    pub async fn wait_for_waiters(&self, count: usize) {
        while self.waiting() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn wait(&self, _window: Duration) {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}
