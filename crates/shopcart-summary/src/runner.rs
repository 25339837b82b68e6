//! Background task feeding the event log into the projection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shopcart_core::repository::StoredEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::projection::CartSummaryProjection;

/// Consumes an ordered event feed and applies each event to the projection.
///
/// Faults are logged and counted; the runner keeps going. The task ends when
/// the feed closes or [`ProjectionRunner::stop`] is called.
#[derive(Debug)]
pub struct ProjectionRunner {
    task: JoinHandle<()>,
    processed: watch::Receiver<u64>,
    faults: Arc<AtomicU64>,
}

impl ProjectionRunner {
    /// Spawns the runner on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(
        projection: Arc<CartSummaryProjection>,
        mut feed: mpsc::UnboundedReceiver<StoredEvent>,
    ) -> Self {
        let (processed_tx, processed) = watch::channel(0_u64);
        let faults = Arc::new(AtomicU64::new(0));
        let task_faults = Arc::clone(&faults);

        let task = tokio::spawn(async move {
            info!("projection runner started");
            while let Some(event) = feed.recv().await {
                if let Err(e) = projection.apply(&event).await {
                    task_faults.fetch_add(1, Ordering::SeqCst);
                    if e.is_integrity_fault() {
                        warn!(
                            event_id = %event.event_id,
                            error = %e,
                            "event quarantined, continuing"
                        );
                    } else {
                        error!(
                            event_id = %event.event_id,
                            error = %e,
                            "failed to apply event, continuing"
                        );
                    }
                }
                processed_tx.send_modify(|count| *count += 1);
            }
            info!("event feed closed, projection runner stopped");
        });

        Self {
            task,
            processed,
            faults,
        }
    }

    /// Returns the number of events taken off the feed so far, whether
    /// applied, skipped, or faulted.
    #[must_use]
    pub fn applied_count(&self) -> u64 {
        *self.processed.borrow()
    }

    /// Returns the number of events that could not be applied.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` events have been processed. Returns
    /// `false` if the runner stopped first.
    pub async fn wait_until_processed(&self, count: u64) -> bool {
        let mut processed = self.processed.clone();
        processed.wait_for(|seen| *seen >= count).await.is_ok()
    }

    /// Returns `true` once the background task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Aborts the background task and waits for it to finish.
    pub async fn stop(&mut self) {
        self.task.abort();
        match (&mut self.task).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => info!("projection runner stopped"),
            Err(e) => error!(error = %e, "projection runner panicked"),
        }
    }
}

impl Drop for ProjectionRunner {
    fn drop(&mut self) {
        self.task.abort();
    }
}
