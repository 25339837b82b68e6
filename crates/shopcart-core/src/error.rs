//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// A creation command targeted an aggregate that already has history.
    #[error("aggregate already exists: {0}")]
    AggregateAlreadyExists(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A required command field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The article is already present in the cart.
    #[error("article {article} is already in cart {cart_id}")]
    DuplicateArticle {
        /// The cart that rejected the article.
        cart_id: String,
        /// The article that was already present.
        article: String,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors caused by the caller's input; retrying the
    /// same command unchanged will fail the same way.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AggregateNotFound(_)
                | Self::AggregateAlreadyExists(_)
                | Self::Validation(_)
                | Self::DuplicateArticle { .. }
        )
    }
}
