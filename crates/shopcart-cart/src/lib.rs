//! Shopcart: shopping cart aggregate.
//!
//! Validates cart commands against state rebuilt from the cart's event
//! history and records the resulting events.

pub mod application;
pub mod domain;
