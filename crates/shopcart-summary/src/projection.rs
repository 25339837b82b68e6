//! Cart summary projection.
//!
//! Folds cart events into one summary row per cart and notifies live
//! subscriptions after each row change. Events for carts without a row, and
//! payloads that are not cart events, are data integrity faults: they are
//! logged, quarantined, and returned as errors.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use shopcart_cart::domain::events::{CartEventKind, CartStarted};
use shopcart_core::clock::Clock;
use shopcart_core::repository::StoredEvent;
use tracing::{debug, error, warn};

use crate::emitter::{CountSubscription, FetchSubscription, QueryUpdateEmitter};
use crate::error::ProjectionError;
use crate::store::SummaryStore;
use crate::summary::{
    CartSummary, CountSummaries, CountSummariesResponse, FetchSummaries, SummaryFilter,
};

/// What `apply` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The row was created or changed.
    Applied,
    /// The event was already reflected in the row and was ignored.
    Skipped,
}

/// An event set aside because it could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedEvent {
    /// The event as delivered.
    pub event: StoredEvent,
    /// Why it was quarantined.
    pub reason: String,
}

/// Read model keeping one `CartSummary` per cart.
pub struct CartSummaryProjection {
    store: Arc<dyn SummaryStore>,
    emitter: QueryUpdateEmitter,
    clock: Arc<dyn Clock>,
    last_count_at: Mutex<Option<DateTime<Utc>>>,
    quarantine: Mutex<Vec<QuarantinedEvent>>,
}

impl std::fmt::Debug for CartSummaryProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSummaryProjection")
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}

impl CartSummaryProjection {
    /// Creates a projection over `store`, stamping count answers with
    /// `clock`.
    #[must_use]
    pub fn new(
        store: Arc<dyn SummaryStore>,
        emitter: QueryUpdateEmitter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            emitter,
            clock,
            last_count_at: Mutex::new(None),
            quarantine: Mutex::new(Vec::new()),
        }
    }

    /// Applies one event from the cart log.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Decode` if the payload is not a cart event,
    /// `ProjectionError::StreamMismatch` if the payload names a cart other
    /// than its stream, `ProjectionError::UnknownCart` if the cart has no row
    /// yet (all three are quarantined), or `ProjectionError::Storage` if the
    /// store fails.
    pub async fn apply(&self, stored: &StoredEvent) -> Result<ApplyOutcome, ProjectionError> {
        let kind = match CartEventKind::from_payload(&stored.payload) {
            Ok(kind) => kind,
            Err(e) => {
                let fault = ProjectionError::Decode(e.to_string());
                error!(
                    cart_id = %stored.aggregate_id,
                    event_type = %stored.event_type,
                    sequence_number = stored.sequence_number,
                    error = %fault,
                    "undecodable event quarantined"
                );
                self.quarantine_event(stored, &fault);
                return Err(fault);
            }
        };

        if kind.cart_id() != stored.aggregate_id {
            let fault = ProjectionError::StreamMismatch {
                stream_id: stored.aggregate_id.clone(),
                cart_id: kind.cart_id().to_owned(),
                event_type: stored.event_type.clone(),
                sequence_number: stored.sequence_number,
            };
            error!(
                cart_id = %stored.aggregate_id,
                payload_cart_id = kind.cart_id(),
                sequence_number = stored.sequence_number,
                "data integrity fault: payload names another cart, event quarantined"
            );
            self.quarantine_event(stored, &fault);
            return Err(fault);
        }

        match kind {
            CartEventKind::Started(started) => self.on_started(stored, started).await,
            CartEventKind::ArticleAdded(added) => {
                self.on_item_change(stored, |items| {
                    if !items.contains(&added.article) {
                        items.push(added.article);
                    }
                })
                .await
            }
            CartEventKind::ArticleRemoved(removed) => {
                self.on_item_change(stored, |items| {
                    items.retain(|item| *item != removed.article);
                })
                .await
            }
        }
    }

    async fn on_started(
        &self,
        stored: &StoredEvent,
        started: CartStarted,
    ) -> Result<ApplyOutcome, ProjectionError> {
        if let Some(existing) = self.store.get(&stored.aggregate_id).await? {
            if stored.sequence_number > existing.version {
                warn!(
                    cart_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    "repeated started event ignored"
                );
            }
            return Ok(ApplyOutcome::Skipped);
        }

        let summary = CartSummary {
            id: stored.aggregate_id.clone(),
            customer: started.customer,
            items: Vec::new(),
            version: stored.sequence_number,
        };
        self.store.save(&summary).await?;
        let notified = self.emitter.emit_count_changed(&summary.id);
        debug!(
            cart_id = %summary.id,
            sequence_number = stored.sequence_number,
            notified,
            "summary row created"
        );
        Ok(ApplyOutcome::Applied)
    }

    async fn on_item_change<F>(
        &self,
        stored: &StoredEvent,
        change: F,
    ) -> Result<ApplyOutcome, ProjectionError>
    where
        F: FnOnce(&mut Vec<String>) + Send,
    {
        let Some(mut summary) = self.store.get(&stored.aggregate_id).await? else {
            let fault = ProjectionError::UnknownCart {
                cart_id: stored.aggregate_id.clone(),
                event_type: stored.event_type.clone(),
                sequence_number: stored.sequence_number,
            };
            error!(
                cart_id = %stored.aggregate_id,
                event_type = %stored.event_type,
                sequence_number = stored.sequence_number,
                "data integrity fault: event for unknown cart quarantined"
            );
            self.quarantine_event(stored, &fault);
            return Err(fault);
        };

        if stored.sequence_number <= summary.version {
            debug!(
                cart_id = %summary.id,
                sequence_number = stored.sequence_number,
                version = summary.version,
                "redelivered event skipped"
            );
            return Ok(ApplyOutcome::Skipped);
        }

        change(&mut summary.items);
        summary.version = stored.sequence_number;
        self.store.save(&summary).await?;
        let notified = self.emitter.emit_row(&summary);
        debug!(
            cart_id = %summary.id,
            event_type = %stored.event_type,
            sequence_number = stored.sequence_number,
            notified,
            "summary row updated"
        );
        Ok(ApplyOutcome::Applied)
    }

    fn quarantine_event(&self, stored: &StoredEvent, fault: &ProjectionError) {
        self.quarantine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(QuarantinedEvent {
                event: stored.clone(),
                reason: fault.to_string(),
            });
    }

    /// Returns a page of rows matching the query's filter, in insertion
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` if the store fails.
    pub async fn fetch(&self, query: &FetchSummaries) -> Result<Vec<CartSummary>, ProjectionError> {
        self.store
            .fetch(&query.filter, query.offset, query.limit)
            .await
    }

    /// Counts rows matching the query's filter.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` if the store fails.
    pub async fn count(
        &self,
        query: &CountSummaries,
    ) -> Result<CountSummariesResponse, ProjectionError> {
        let count = self.store.count(&query.filter).await?;
        Ok(CountSummariesResponse {
            count,
            as_of: self.next_as_of(),
        })
    }

    fn next_as_of(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut last = self
            .last_count_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let as_of = last.map_or(now, |previous| previous.max(now));
        *last = Some(as_of);
        as_of
    }

    /// Subscribes to row updates matching `filter`.
    pub fn subscribe_fetch(&self, filter: SummaryFilter) -> FetchSubscription {
        self.emitter.subscribe_fetch(filter)
    }

    /// Subscribes to coalesced count changes matching `filter`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe_count(&self, filter: SummaryFilter) -> CountSubscription {
        self.emitter.subscribe_count(filter)
    }

    /// Returns the update emitter.
    #[must_use]
    pub fn emitter(&self) -> &QueryUpdateEmitter {
        &self.emitter
    }

    /// Returns the events quarantined so far.
    #[must_use]
    pub fn quarantined(&self) -> Vec<QuarantinedEvent> {
        self.quarantine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
