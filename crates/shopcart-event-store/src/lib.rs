//! Shopcart event store.
//!
//! An in-memory event log: append-only, totally ordered per aggregate, with
//! optimistic concurrency on append and an ordered delivery feed for
//! projections. Durable storage is left to an external log.

pub mod in_memory_event_repository;
