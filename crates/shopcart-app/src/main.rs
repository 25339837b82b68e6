//! Shopping cart console entry point.

use std::error::Error;
use std::sync::Arc;

use shopcart_app::config::{AppConfig, LogFormat};
use shopcart_app::console::{Console, HELP, Reply, parse_line, read_line};
use shopcart_app::state::AppState;
use shopcart_core::clock::SystemClock;
use shopcart_core::scheduler::TokioScheduler;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        count_window_ms = u64::try_from(config.count_window.as_millis()).unwrap_or(u64::MAX),
        "Starting shopping cart console"
    );

    let mut state = AppState::new(&config, Arc::new(SystemClock), Arc::new(TokioScheduler))?;
    let (notices_tx, mut notices) = mpsc::unbounded_channel();
    let mut console = Console::new(Arc::clone(&state.projection), notices_tx);

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = read_line(&mut lines) => {
                let Some(line) = line? else { break };
                let command = match parse_line(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("error: {e}");
                        continue;
                    }
                };
                match console.execute(&state, command).await {
                    Ok(Reply::Output(text)) => println!("{text}"),
                    Ok(Reply::Quit) => break,
                    Err(e) if e.is_recoverable() => println!("error: {e}"),
                    Err(e) => {
                        tracing::error!(error = %e, "fatal error, shutting down");
                        console.shutdown();
                        state.shutdown().await;
                        return Err(e.into());
                    }
                }
            }
            Some(notice) = notices.recv() => println!("{notice}"),
        }
    }

    console.shutdown();
    state.shutdown().await;
    tracing::info!(
        projection_faults = state.projection_faults(),
        "Shopping cart console stopped"
    );
    Ok(())
}
