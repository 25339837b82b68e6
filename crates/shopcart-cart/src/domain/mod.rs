//! Cart domain model: commands, events, and the aggregate root.

pub mod aggregates;
pub mod commands;
pub mod events;
