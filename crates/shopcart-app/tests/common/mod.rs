//! Shared test helpers for console integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use shopcart_app::config::AppConfig;
use shopcart_app::console::{Console, Reply, parse_line};
use shopcart_app::error::AppError;
use shopcart_app::state::AppState;
use shopcart_core::clock::Clock;
use shopcart_core::scheduler::Scheduler;
use shopcart_test_support::{FixedClock, ManualScheduler};
use tokio::sync::mpsc;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A console session wired to a fresh application with a fixed clock and a
/// manually driven coalescing scheduler.
pub struct TestSession {
    pub state: AppState,
    pub console: Console,
    pub notices: mpsc::UnboundedReceiver<String>,
    pub scheduler: Arc<ManualScheduler>,
}

/// Build the full application the same way `main.rs` does, with
/// deterministic clock and scheduler.
pub fn build_test_session() -> TestSession {
    let scheduler = Arc::new(ManualScheduler::new());
    let state = AppState::new(
        &AppConfig::default(),
        fixed_clock(),
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
    )
    .unwrap();
    let (notices_tx, notices) = mpsc::unbounded_channel();
    let console = Console::new(Arc::clone(&state.projection), notices_tx);
    TestSession {
        state,
        console,
        notices,
        scheduler,
    }
}

impl TestSession {
    /// Parse and execute one console line.
    pub async fn run(&mut self, line: &str) -> Result<Reply, AppError> {
        let command = parse_line(line)?.expect("test lines are never blank");
        self.console.execute(&self.state, command).await
    }

    /// Execute one console line that must succeed and return its output.
    pub async fn output(&mut self, line: &str) -> String {
        match self.run(line).await {
            Ok(Reply::Output(text)) => text,
            other => panic!("expected output for {line:?}, got {other:?}"),
        }
    }

    /// Wait for the next live notice.
    pub async fn next_notice(&mut self) -> String {
        self.notices.recv().await.expect("notice channel closed")
    }
}
