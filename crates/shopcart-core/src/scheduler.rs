//! Scheduler abstraction for time-windowed work.
//!
//! Only the count-notification coalescing in the summary projection waits on
//! time. Injecting the scheduler lets tests open and close coalescing windows
//! explicitly instead of sleeping.

use std::time::Duration;

use async_trait::async_trait;

/// Abstraction over waiting for a time window to elapse.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Completes once `window` has elapsed.
    async fn wait(&self, window: Duration);
}

/// Production scheduler backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn wait(&self, window: Duration) {
        tokio::time::sleep(window).await;
    }
}
