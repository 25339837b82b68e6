//! Application services for the cart: command handlers, queries, dispatch.

pub mod command_handlers;
pub mod dispatcher;
pub mod query_handlers;
