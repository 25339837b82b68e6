//! Caller-context subscription queries.
//!
//! A `SummarySubscriber` stands for one consumer of the summary view (a
//! console session, a screen). It holds at most one live fetch subscription
//! and one live count subscription; starting a new query of either kind
//! cancels the previous one.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::emitter::{CountSignal, CountSubscription, FetchSubscription};
use crate::error::ProjectionError;
use crate::projection::CartSummaryProjection;
use crate::subscription::SubscriptionHandle;
use crate::summary::{CartSummary, CountSummaries, CountSummariesResponse, FetchSummaries};

/// Initial answer of a subscription query plus its live update stream.
#[derive(Debug)]
pub struct SubscriptionQueryResult<I, S> {
    /// Answer computed after the subscription was registered.
    pub initial_result: I,
    /// Updates arriving after registration.
    pub updates: S,
}

/// One caller's view onto the summary projection.
#[derive(Debug)]
pub struct SummarySubscriber {
    projection: Arc<CartSummaryProjection>,
    fetch: Mutex<Option<SubscriptionHandle<CartSummary>>>,
    count: Mutex<Option<SubscriptionHandle<CountSignal>>>,
}

impl SummarySubscriber {
    /// Creates a subscriber with no live subscriptions.
    #[must_use]
    pub fn new(projection: Arc<CartSummaryProjection>) -> Self {
        Self {
            projection,
            fetch: Mutex::new(None),
            count: Mutex::new(None),
        }
    }

    /// Runs a fetch query and keeps it live, cancelling this caller's
    /// previous fetch subscription.
    ///
    /// The subscription is registered before the initial page is read, so no
    /// row change between the two is lost.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` if the initial page cannot be read.
    /// The new subscription is cancelled in that case.
    pub async fn fetch(
        &self,
        query: &FetchSummaries,
    ) -> Result<SubscriptionQueryResult<Vec<CartSummary>, FetchSubscription>, ProjectionError>
    {
        let updates = self.projection.subscribe_fetch(query.filter.clone());
        supersede(&self.fetch, updates.handle());
        debug!(
            prefix = %query.filter.id_starts_with,
            offset = query.offset,
            limit = query.limit,
            "fetch subscription registered"
        );

        let initial_result = self.projection.fetch(query).await?;
        Ok(SubscriptionQueryResult {
            initial_result,
            updates,
        })
    }

    /// Runs a count query and keeps it live, cancelling this caller's
    /// previous count subscription.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` if the initial count cannot be
    /// read. The new subscription is cancelled in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub async fn count(
        &self,
        query: &CountSummaries,
    ) -> Result<SubscriptionQueryResult<CountSummariesResponse, CountSubscription>, ProjectionError>
    {
        let updates = self.projection.subscribe_count(query.filter.clone());
        supersede(&self.count, updates.handle());
        debug!(
            prefix = %query.filter.id_starts_with,
            "count subscription registered"
        );

        let initial_result = self.projection.count(query).await?;
        Ok(SubscriptionQueryResult {
            initial_result,
            updates,
        })
    }

    /// Cancels both live subscriptions.
    pub fn shutdown(&self) {
        cancel_slot(&self.fetch);
        cancel_slot(&self.count);
    }
}

impl Drop for SummarySubscriber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn supersede<U>(slot: &Mutex<Option<SubscriptionHandle<U>>>, handle: SubscriptionHandle<U>) {
    let previous = slot
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(handle);
    if let Some(previous) = previous {
        previous.cancel();
        debug!("previous subscription superseded");
    }
}

fn cancel_slot<U>(slot: &Mutex<Option<SubscriptionHandle<U>>>) {
    let current = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(current) = current {
        current.cancel();
    }
}
