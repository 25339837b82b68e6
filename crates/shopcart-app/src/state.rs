//! Shared application state.

use std::sync::Arc;

use shopcart_cart::application::command_handlers::CartCommandResult;
use shopcart_cart::application::dispatcher::CartCommandDispatcher;
use shopcart_cart::domain::commands::CartCommand;
use shopcart_core::clock::Clock;
use shopcart_core::repository::EventRepository;
use shopcart_core::scheduler::Scheduler;
use shopcart_event_store::in_memory_event_repository::InMemoryEventRepository;
use shopcart_summary::emitter::QueryUpdateEmitter;
use shopcart_summary::error::ProjectionError;
use shopcart_summary::projection::CartSummaryProjection;
use shopcart_summary::runner::ProjectionRunner;
use shopcart_summary::store::InMemorySummaryStore;

use crate::config::AppConfig;
use crate::error::AppError;

/// The wired command side, event log, and summary projection.
#[derive(Debug)]
pub struct AppState {
    /// Event log shared by the dispatcher and the projection feed.
    pub event_repository: Arc<InMemoryEventRepository>,
    /// Cart command dispatcher.
    pub dispatcher: Arc<CartCommandDispatcher>,
    /// Cart summary read model.
    pub projection: Arc<CartSummaryProjection>,
    runner: ProjectionRunner,
}

impl AppState {
    /// Builds the application and starts the projection runner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the event log feed cannot be opened.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, AppError> {
        let event_repository = Arc::new(InMemoryEventRepository::new());
        let dispatcher = Arc::new(CartCommandDispatcher::new(
            Arc::clone(&event_repository) as Arc<dyn EventRepository>,
            Arc::clone(&clock),
        ));
        let projection = Arc::new(CartSummaryProjection::new(
            Arc::new(InMemorySummaryStore::new()),
            QueryUpdateEmitter::new(scheduler, config.count_window),
            clock,
        ));
        let feed = event_repository.subscribe()?;
        let runner = ProjectionRunner::spawn(Arc::clone(&projection), feed);

        Ok(Self {
            event_repository,
            dispatcher,
            projection,
            runner,
        })
    }

    /// Dispatches a command and waits until the projection has seen every
    /// event in the log, so follow-up queries observe the command's effect.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the command is rejected or the log
    /// fails.
    pub async fn execute(&self, command: &CartCommand) -> Result<CartCommandResult, AppError> {
        let result = self.dispatcher.dispatch(command).await?;
        self.wait_for_projection().await?;
        Ok(result)
    }

    /// Waits until the projection runner has processed the whole log.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the log cannot be read, or
    /// `AppError::Projection` if the runner stopped before catching up.
    pub async fn wait_for_projection(&self) -> Result<(), AppError> {
        let logged = self.event_repository.event_count()?;
        if self.runner.wait_until_processed(logged as u64).await {
            Ok(())
        } else {
            Err(AppError::Projection(ProjectionError::RunnerStopped))
        }
    }

    /// Returns the number of events the projection could not apply.
    #[must_use]
    pub fn projection_faults(&self) -> u64 {
        self.runner.fault_count()
    }

    /// Stops the projection runner.
    pub async fn shutdown(&mut self) {
        self.runner.stop().await;
    }
}
