//! In-memory implementation of the `EventRepository` trait.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use shopcart_core::error::DomainError;
use shopcart_core::repository::{EventRepository, StoredEvent};

/// Receiving end of the event log's delivery feed.
///
/// Yields every committed event exactly once, in commit order. The feed is
/// unbounded so appends never wait on a slow consumer.
pub type EventFeed = mpsc::UnboundedReceiver<StoredEvent>;

#[derive(Debug, Default)]
struct LogState {
    /// Every committed event in commit order.
    log: Vec<StoredEvent>,
    /// Per-aggregate streams, ordered by sequence number.
    streams: HashMap<String, Vec<StoredEvent>>,
    /// Live feeds; closed feeds are pruned on the next append.
    feeds: Vec<mpsc::UnboundedSender<StoredEvent>>,
}

/// Event repository that keeps all streams in process memory.
///
/// Appends to the same aggregate are checked against `expected_version` and
/// rejected with `DomainError::ConcurrencyConflict` when stale. Committed
/// events are pushed to every feed while the log lock is held, so each feed
/// observes one global order that respects every aggregate's stream order.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    state: Mutex<LogState>,
}

impl InMemoryEventRepository {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Infrastructure("event log lock poisoned".into()))
    }

    /// Opens a delivery feed.
    ///
    /// The feed first replays the whole log, then continues with events as
    /// they are committed. No event is skipped or duplicated across the
    /// catch-up/live boundary.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the log lock is poisoned.
    pub fn subscribe(&self) -> Result<EventFeed, DomainError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock()?;
        for event in &state.log {
            // The receiver is still in scope, so the send cannot fail.
            let _ = tx.send(event.clone());
        }
        state.feeds.push(tx);
        tracing::debug!(replayed = state.log.len(), "event feed opened");
        Ok(rx)
    }

    /// Returns the number of committed events across all aggregates.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the log lock is poisoned.
    pub fn event_count(&self) -> Result<usize, DomainError> {
        Ok(self.lock()?.log.len())
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        let state = self.lock()?;
        Ok(state.streams.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn append_events(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.lock()?;
        let actual = state
            .streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map_or(0, |event| event.sequence_number);
        if actual != expected_version {
            tracing::warn!(
                aggregate_id,
                expected_version,
                actual,
                "rejected append with stale expected version"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.to_owned(),
                expected: expected_version,
                actual,
            });
        }

        let mut next = expected_version;
        for event in events {
            next += 1;
            if event.aggregate_id != aggregate_id {
                return Err(DomainError::Infrastructure(format!(
                    "event {} belongs to aggregate {}, not {aggregate_id}",
                    event.event_id, event.aggregate_id
                )));
            }
            if event.sequence_number != next {
                return Err(DomainError::Infrastructure(format!(
                    "event {} has sequence number {}, expected {next}",
                    event.event_id, event.sequence_number
                )));
            }
        }

        let LogState {
            log,
            streams,
            feeds,
        } = &mut *state;
        streams
            .entry(aggregate_id.to_owned())
            .or_default()
            .extend_from_slice(events);
        for event in events {
            log.push(event.clone());
            feeds.retain(|feed| feed.send(event.clone()).is_ok());
        }

        tracing::debug!(
            aggregate_id,
            appended = events.len(),
            version = next,
            "events committed"
        );
        Ok(())
    }
}
