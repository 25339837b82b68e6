//! Aggregate root for the shopping cart.

use std::collections::HashMap;

use shopcart_core::aggregate::AggregateRoot;
use shopcart_core::clock::Clock;
use shopcart_core::error::DomainError;
use shopcart_core::event::EventMetadata;
use uuid::Uuid;

use super::events::{ArticleAdded, ArticleRemoved, CartEvent, CartEventKind, CartStarted};

/// Placeholder unit price recorded for every added article.
pub const PLACEHOLDER_PRICE: f64 = 0.0;

/// An article line in the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    /// Unit price at the time the article was added.
    pub price: f64,
}

/// Lifecycle state of a cart.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CartState {
    /// No `Started` event has been applied.
    #[default]
    Uninitialized,
    /// The cart has been started. There is no terminal state after this.
    Active {
        /// The customer owning the cart.
        customer: String,
        /// Articles currently in the cart.
        items: HashMap<String, CartItem>,
    },
}

/// The aggregate root for a shopping cart.
#[derive(Debug)]
pub struct ShoppingCart {
    /// Aggregate identifier.
    pub id: String,
    /// Committed version (event count).
    pub(crate) version: i64,
    /// Current state, including the effect of uncommitted events.
    state: CartState,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<CartEvent>,
}

impl ShoppingCart {
    /// Creates a new, uninitialized cart.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            state: CartState::Uninitialized,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Returns `true` once the cart has been started.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, CartState::Active { .. })
    }

    /// Returns the customer, if the cart has been started.
    #[must_use]
    pub fn customer(&self) -> Option<&str> {
        match &self.state {
            CartState::Active { customer, .. } => Some(customer),
            CartState::Uninitialized => None,
        }
    }

    /// Returns the articles in the cart, if it has been started.
    #[must_use]
    pub fn items(&self) -> Option<&HashMap<String, CartItem>> {
        match &self.state {
            CartState::Active { items, .. } => Some(items),
            CartState::Uninitialized => None,
        }
    }

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn active_items(&self) -> Result<&HashMap<String, CartItem>, DomainError> {
        self.items()
            .ok_or_else(|| DomainError::AggregateNotFound(self.id.clone()))
    }

    /// Records a new event and folds it into the current state.
    fn record(&mut self, kind: CartEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        // TODO: event_id uses Uuid::new_v4(); replaying a command log would
        // need the id generator injected alongside the clock.
        let event = CartEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id.clone(),
                sequence_number: self.next_sequence_number(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };

        self.mutate(&event.kind);
        self.uncommitted_events.push(event);
    }

    /// Starts the cart for `customer`, producing a `Started` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the cart id or the customer is
    /// empty, and `DomainError::AggregateAlreadyExists` if the cart has
    /// already been started.
    pub fn start(
        &mut self,
        customer: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::Validation("cart id must be specified".into()));
        }
        if customer.trim().is_empty() {
            return Err(DomainError::Validation("customer must be specified".into()));
        }
        if self.is_active() {
            return Err(DomainError::AggregateAlreadyExists(self.id.clone()));
        }

        self.record(
            CartEventKind::Started(CartStarted {
                cart_id: self.id.clone(),
                customer: customer.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Adds an article to the cart, producing an `ArticleAdded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the cart has not been
    /// started, `DomainError::Validation` if the article is empty, and
    /// `DomainError::DuplicateArticle` if the article is already present.
    pub fn add_article(
        &mut self,
        article: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let items = self.active_items()?;
        if article.trim().is_empty() {
            return Err(DomainError::Validation("article must be specified".into()));
        }
        if items.contains_key(article) {
            return Err(DomainError::DuplicateArticle {
                cart_id: self.id.clone(),
                article: article.to_owned(),
            });
        }

        self.record(
            CartEventKind::ArticleAdded(ArticleAdded {
                cart_id: self.id.clone(),
                article: article.to_owned(),
                price: PLACEHOLDER_PRICE,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Removes an article from the cart, producing an `ArticleRemoved` event.
    ///
    /// Removing an article that is not in the cart is a no-op and produces
    /// no event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the cart has not been
    /// started.
    pub fn remove_article(
        &mut self,
        article: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !self.active_items()?.contains_key(article) {
            return Ok(());
        }

        self.record(
            CartEventKind::ArticleRemoved(ArticleRemoved {
                cart_id: self.id.clone(),
                article: article.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Pure state transition shared by command handling and replay.
    fn mutate(&mut self, kind: &CartEventKind) {
        match kind {
            CartEventKind::Started(payload) => {
                if self.is_active() {
                    tracing::warn!(cart_id = %self.id, "ignoring repeated Started event");
                } else {
                    self.state = CartState::Active {
                        customer: payload.customer.clone(),
                        items: HashMap::new(),
                    };
                }
            }
            CartEventKind::ArticleAdded(payload) => {
                if let CartState::Active { items, .. } = &mut self.state {
                    items
                        .entry(payload.article.clone())
                        .or_insert(CartItem {
                            price: payload.price,
                        });
                } else {
                    self.warn_not_started(kind);
                }
            }
            CartEventKind::ArticleRemoved(payload) => {
                if let CartState::Active { items, .. } = &mut self.state {
                    items.remove(&payload.article);
                } else {
                    self.warn_not_started(kind);
                }
            }
        }
    }

    fn warn_not_started(&self, kind: &CartEventKind) {
        tracing::warn!(
            cart_id = %self.id,
            event_type = kind.event_type(),
            "ignoring event for a cart that was never started"
        );
    }
}

impl AggregateRoot for ShoppingCart {
    type Event = CartEvent;

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        self.mutate(&event.kind);
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    /// Marks the uncommitted events as persisted: their effect is already in
    /// the state, so only the committed version advances.
    #[allow(clippy::cast_possible_wrap)]
    fn clear_uncommitted_events(&mut self) {
        self.version += self.uncommitted_events.len() as i64;
        self.uncommitted_events.clear();
    }
}
