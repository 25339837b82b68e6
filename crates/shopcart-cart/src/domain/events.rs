//! Domain events for the shopping cart.

use serde::{Deserialize, Serialize};
use shopcart_core::error::DomainError;
use shopcart_core::event::{DomainEvent, EventMetadata};
use shopcart_core::repository::StoredEvent;

/// Event type name for `CartStarted`.
pub const CART_STARTED_EVENT_TYPE: &str = "cart.started";
/// Event type name for `ArticleAdded`.
pub const ARTICLE_ADDED_EVENT_TYPE: &str = "cart.article_added";
/// Event type name for `ArticleRemoved`.
pub const ARTICLE_REMOVED_EVENT_TYPE: &str = "cart.article_removed";

/// Emitted when a cart is started for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartStarted {
    /// The cart identifier.
    pub cart_id: String,
    /// The customer owning the cart.
    pub customer: String,
}

/// Emitted when an article is added to a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleAdded {
    /// The cart identifier.
    pub cart_id: String,
    /// The article identifier.
    pub article: String,
    /// Unit price; always zero until pricing exists.
    pub price: f64,
}

/// Emitted when an article is removed from a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRemoved {
    /// The cart identifier.
    pub cart_id: String,
    /// The article identifier.
    pub article: String,
}

/// Event payload variants for the shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CartEventKind {
    /// A cart has been started.
    Started(CartStarted),
    /// An article has been added to the cart.
    ArticleAdded(ArticleAdded),
    /// An article has been removed from the cart.
    ArticleRemoved(ArticleRemoved),
}

impl CartEventKind {
    /// Returns the cart this event belongs to.
    #[must_use]
    pub fn cart_id(&self) -> &str {
        match self {
            Self::Started(payload) => &payload.cart_id,
            Self::ArticleAdded(payload) => &payload.cart_id,
            Self::ArticleRemoved(payload) => &payload.cart_id,
        }
    }

    /// Returns the event type name for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started(_) => CART_STARTED_EVENT_TYPE,
            Self::ArticleAdded(_) => ARTICLE_ADDED_EVENT_TYPE,
            Self::ArticleRemoved(_) => ARTICLE_REMOVED_EVENT_TYPE,
        }
    }

    /// Decodes the payload of a persisted event.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the payload is not a cart event.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }
}

/// Domain event envelope for the shopping cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CartEventKind,
}

impl CartEvent {
    /// Rebuilds a cart event from its persisted representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if event deserialization fails.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind = CartEventKind::from_payload(&stored.payload).map_err(|e| {
            DomainError::Infrastructure(format!("event deserialization failed: {e}"))
        })?;
        Ok(Self {
            metadata: EventMetadata::from_stored(stored),
            kind,
        })
    }
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("CartEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
