//! Query handlers for the shopping cart.
//!
//! This module contains query handlers that reconstitute aggregates
//! from stored events and return read-only view DTOs.

use serde::Serialize;
use shopcart_core::aggregate::AggregateRoot;
use shopcart_core::error::DomainError;
use shopcart_core::repository::EventRepository;

use crate::application::command_handlers;

/// Read-only view of a cart aggregate.
#[derive(Debug, Serialize)]
pub struct CartView {
    /// The cart identifier.
    pub cart_id: String,
    /// The customer owning the cart.
    pub customer: String,
    /// Articles currently in the cart (sorted for determinism).
    pub items: Vec<String>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a cart by its aggregate ID.
///
/// Loads all stored events for the aggregate, reconstitutes the cart,
/// and returns a serializable view.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the cart was never started.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_cart_by_id(
    cart_id: &str,
    repo: &dyn EventRepository,
) -> Result<CartView, DomainError> {
    let stored_events = repo.load_events(cart_id).await?;
    let cart = command_handlers::reconstitute(cart_id, &stored_events)?;
    let (Some(customer), Some(items)) = (cart.customer(), cart.items()) else {
        return Err(DomainError::AggregateNotFound(cart_id.to_owned()));
    };
    let mut items: Vec<String> = items.keys().cloned().collect();
    items.sort();
    Ok(CartView {
        cart_id: cart_id.to_owned(),
        customer: customer.to_owned(),
        items,
        version: cart.version(),
    })
}
