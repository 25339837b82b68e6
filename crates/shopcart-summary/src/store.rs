//! Summary table storage.
//!
//! Rows are held in memory as `StoredSummary` records whose item list is
//! marshaled to a JSON array string at the storage boundary. Everything
//! above this module works with the typed `Vec<String>`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::ProjectionError;
use crate::summary::{CartSummary, SummaryFilter};

/// Storage record for one summary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSummary {
    /// The customer owning the cart.
    pub customer: String,
    /// Item list encoded with [`encode_items`].
    pub items: String,
    /// Sequence number of the last applied event.
    pub version: i64,
}

/// Encodes an item list for storage.
///
/// # Errors
///
/// Returns `ProjectionError::Storage` if serialization fails.
pub fn encode_items(items: &[String]) -> Result<String, ProjectionError> {
    serde_json::to_string(items).map_err(|e| ProjectionError::Storage(e.to_string()))
}

/// Decodes a stored item list. An empty string decodes to an empty list.
///
/// # Errors
///
/// Returns `ProjectionError::Storage` if the string is not a JSON array of
/// strings.
pub fn decode_items(encoded: &str) -> Result<Vec<String>, ProjectionError> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(encoded).map_err(|e| ProjectionError::Storage(e.to_string()))
}

impl StoredSummary {
    /// Builds the storage record for a row.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` if the items cannot be encoded.
    pub fn from_summary(summary: &CartSummary) -> Result<Self, ProjectionError> {
        Ok(Self {
            customer: summary.customer.clone(),
            items: encode_items(&summary.items)?,
            version: summary.version,
        })
    }

    /// Rebuilds the row for `cart_id` from this record.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` if the items cannot be decoded.
    pub fn to_summary(&self, cart_id: &str) -> Result<CartSummary, ProjectionError> {
        Ok(CartSummary {
            id: cart_id.to_owned(),
            customer: self.customer.clone(),
            items: decode_items(&self.items)?,
            version: self.version,
        })
    }
}

/// Storage collaborator for the summary table.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Returns the row for `cart_id`, if any.
    async fn get(&self, cart_id: &str) -> Result<Option<CartSummary>, ProjectionError>;

    /// Inserts a new row, or replaces an existing row in place.
    async fn save(&self, summary: &CartSummary) -> Result<(), ProjectionError>;

    /// Returns matching rows in insertion order, sliced by `offset` and
    /// `limit`.
    async fn fetch(
        &self,
        filter: &SummaryFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CartSummary>, ProjectionError>;

    /// Returns the number of matching rows.
    async fn count(&self, filter: &SummaryFilter) -> Result<usize, ProjectionError>;
}

#[derive(Debug, Default)]
struct Table {
    order: Vec<String>,
    rows: HashMap<String, StoredSummary>,
}

/// In-memory summary table preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemorySummaryStore {
    table: RwLock<Table>,
}

impl InMemorySummaryStore {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw storage record for `cart_id`.
    #[must_use]
    pub fn stored(&self, cart_id: &str) -> Option<StoredSummary> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .get(cart_id)
            .cloned()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn get(&self, cart_id: &str) -> Result<Option<CartSummary>, ProjectionError> {
        self.stored(cart_id)
            .map(|record| record.to_summary(cart_id))
            .transpose()
    }

    async fn save(&self, summary: &CartSummary) -> Result<(), ProjectionError> {
        let record = StoredSummary::from_summary(summary)?;
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.rows.insert(summary.id.clone(), record).is_none() {
            table.order.push(summary.id.clone());
        }
        Ok(())
    }

    async fn fetch(
        &self,
        filter: &SummaryFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CartSummary>, ProjectionError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .order
            .iter()
            .filter(|id| filter.matches(id))
            .skip(offset)
            .take(limit)
            .filter_map(|id| table.rows.get(id).map(|record| record.to_summary(id)))
            .collect()
    }

    async fn count(&self, filter: &SummaryFilter) -> Result<usize, ProjectionError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.order.iter().filter(|id| filter.matches(id)).count())
    }
}
