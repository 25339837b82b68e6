//! Read-model rows and the queries served from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary row for one cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    /// The cart identifier.
    pub id: String,
    /// The customer owning the cart.
    pub customer: String,
    /// Articles in the cart, in the order they were added.
    pub items: Vec<String>,
    /// Sequence number of the last event applied to this row.
    pub version: i64,
}

/// Filter shared by fetch and count queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFilter {
    /// Only rows whose id starts with this prefix match. Empty matches all.
    pub id_starts_with: String,
}

impl SummaryFilter {
    /// Creates a filter matching ids that start with `prefix`.
    #[must_use]
    pub fn starting_with(prefix: impl Into<String>) -> Self {
        Self {
            id_starts_with: prefix.into(),
        }
    }

    /// Returns `true` if the cart id matches this filter.
    #[must_use]
    pub fn matches(&self, cart_id: &str) -> bool {
        cart_id.starts_with(&self.id_starts_with)
    }
}

/// Query for a page of summary rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummaries {
    /// Number of matching rows to skip.
    pub offset: usize,
    /// Maximum number of rows to return.
    pub limit: usize,
    /// Row filter.
    pub filter: SummaryFilter,
}

/// Query for the number of matching summary rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSummaries {
    /// Row filter.
    pub filter: SummaryFilter,
}

/// Answer to a `CountSummaries` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountSummariesResponse {
    /// Number of matching rows.
    pub count: usize,
    /// When the count was computed. Never earlier than a previously
    /// returned `as_of`.
    pub as_of: DateTime<Utc>,
}

/// Notification that the number of rows matching a count subscription may
/// have changed. Carries no count: the subscriber re-queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountChanged {
    /// Number of raw change signals merged into this notification.
    pub coalesced: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_every_id() {
        let filter = SummaryFilter::default();

        assert!(filter.matches("C1"));
        assert!(filter.matches(""));
    }

    #[test]
    fn test_filter_matches_on_prefix_only() {
        let filter = SummaryFilter::starting_with("C1");

        assert!(filter.matches("C1"));
        assert!(filter.matches("C10"));
        assert!(!filter.matches("XC1"));
        assert!(!filter.matches("C2"));
    }
}
