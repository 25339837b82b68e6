//! Deterministic `Clock` implementations for tests.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use shopcart_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that returns a scripted sequence of instants, repeating the last
/// one once the script runs out. Used to exercise timestamps that go
/// backwards.
#[derive(Debug)]
pub struct SteppingClock {
    instants: Mutex<Vec<DateTime<Utc>>>,
}

impl SteppingClock {
    /// Creates a clock that returns `instants` in order.
    ///
    /// # Panics
    ///
    /// Panics if `instants` is empty.
    #[must_use]
    pub fn new(instants: Vec<DateTime<Utc>>) -> Self {
        assert!(!instants.is_empty(), "SteppingClock needs at least one instant");
        let mut instants = instants;
        instants.reverse();
        Self {
            instants: Mutex::new(instants),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut instants = self.instants.lock().unwrap();
        if instants.len() > 1 {
            instants.pop().unwrap()
        } else {
            instants[0]
        }
    }
}
