//! Shopping cart console application.
//!
//! Wires the cart command side, the in-memory event log, and the summary
//! projection together, and drives them from line-oriented console input.

pub mod config;
pub mod console;
pub mod error;
pub mod state;
