//! Command dispatch with single-writer-per-cart serialization.
//!
//! Commands for the same cart run strictly one after another so the
//! load-validate-append sequence is atomic per cart. Commands for different
//! carts proceed in parallel. The repository's optimistic concurrency check
//! still guards against writers outside this dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use shopcart_core::clock::Clock;
use shopcart_core::command::Command;
use shopcart_core::error::DomainError;
use shopcart_core::repository::EventRepository;
use tracing::Instrument;

use crate::application::command_handlers::{
    CartCommandResult, handle_add_article, handle_remove_article, handle_start_cart,
};
use crate::domain::commands::CartCommand;

type CartLock = Arc<tokio::sync::Mutex<()>>;

/// Routes cart commands to their handlers, one at a time per cart.
pub struct CartCommandDispatcher {
    repo: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<String, CartLock>>,
}

impl std::fmt::Debug for CartCommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCommandDispatcher").finish_non_exhaustive()
    }
}

impl CartCommandDispatcher {
    /// Creates a dispatcher writing through `repo` and stamping events with
    /// `clock`.
    #[must_use]
    pub fn new(repo: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lease<'a>(&'a self, cart_id: &'a str) -> Result<LockLease<'a>, DomainError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| DomainError::Infrastructure("dispatcher lock table poisoned".into()))?;
        let lock = Arc::clone(locks.entry(cart_id.to_owned()).or_default());
        Ok(LockLease {
            locks: &self.locks,
            cart_id,
            lock,
        })
    }

    /// Dispatches a command to the cart it targets and waits for the result.
    ///
    /// # Errors
    ///
    /// Returns whatever `DomainError` the command handler produced.
    pub async fn dispatch(&self, command: &CartCommand) -> Result<CartCommandResult, DomainError> {
        let cart_id = command.target_aggregate_id();
        let span = tracing::info_span!(
            "dispatch",
            command_type = command.command_type(),
            cart_id,
            correlation_id = %command.correlation_id(),
        );

        async {
            let lease = self.lease(cart_id)?;
            let result = {
                let _guard = lease.lock.lock().await;
                self.handle(command).await
            };
            drop(lease);

            match &result {
                Ok(outcome) => tracing::info!(
                    events = outcome.stored_events.len(),
                    "command handled"
                ),
                Err(err) if err.is_rejection() => tracing::warn!(error = %err, "command rejected"),
                Err(err) => tracing::error!(error = %err, "command failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn handle(&self, command: &CartCommand) -> Result<CartCommandResult, DomainError> {
        let clock = self.clock.as_ref();
        let repo = self.repo.as_ref();
        match command {
            CartCommand::Start(command) => handle_start_cart(command, clock, repo).await,
            CartCommand::AddArticle(command) => handle_add_article(command, clock, repo).await,
            CartCommand::RemoveArticle(command) => {
                handle_remove_article(command, clock, repo).await
            }
        }
    }
}

/// A reference to one cart's lock. Dropping it removes the cart's entry
/// from the lock table once no other dispatch holds or awaits that lock, so
/// a dispatch cancelled mid-wait does not leak its entry.
struct LockLease<'a> {
    locks: &'a Mutex<HashMap<String, CartLock>>,
    cart_id: &'a str,
    lock: CartLock,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        // Give up this lease's reference before counting the others.
        drop(std::mem::take(&mut self.lock));
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(self.cart_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(self.cart_id);
        }
    }
}
