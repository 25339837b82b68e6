//! Shared test mocks and utilities for the shopping cart.

mod clock;
mod repository;
mod scheduler;

pub use clock::{FixedClock, SteppingClock};
pub use repository::{EmptyEventRepository, FailingEventRepository, RecordingEventRepository};
pub use scheduler::ManualScheduler;
