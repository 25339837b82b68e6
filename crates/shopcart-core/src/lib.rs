//! Shopcart Core: shared event-sourcing abstractions.
//!
//! This crate defines the traits and types the cart aggregate and the
//! summary projection both depend on. It contains no infrastructure code
//! beyond the production `Clock` and `Scheduler` implementations.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
pub mod scheduler;
