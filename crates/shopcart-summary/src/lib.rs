//! Shopcart summary projection.
//!
//! Consumes cart events in order, keeps one summary row per cart, answers
//! paged and count queries, and pushes live updates to subscription queries.
//! Count-change notifications are coalesced over a time window; row updates
//! are delivered individually.

pub mod emitter;
pub mod error;
pub mod projection;
pub mod runner;
pub mod store;
pub mod subscriber;
pub mod subscription;
pub mod summary;
