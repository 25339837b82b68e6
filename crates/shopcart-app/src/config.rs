//! Application configuration read from the environment.

use std::time::Duration;

use shopcart_summary::emitter::DEFAULT_COUNT_WINDOW;

use crate::error::AppError;

/// Environment variable holding the count coalescing window in milliseconds.
pub const COUNT_WINDOW_VAR: &str = "SHOPCART_COUNT_WINDOW_MS";
/// Environment variable selecting the log output format.
pub const LOG_FORMAT_VAR: &str = "SHOPCART_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Runtime configuration for the console application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Window over which count-change notifications are coalesced.
    pub count_window: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            count_window: DEFAULT_COUNT_WINDOW,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(COUNT_WINDOW_VAR) {
            let millis: u64 = raw.trim().parse().map_err(|e| {
                AppError::Config(format!(
                    "{COUNT_WINDOW_VAR} must be a whole number of milliseconds: {e}"
                ))
            })?;
            if millis == 0 {
                return Err(AppError::Config(format!(
                    "{COUNT_WINDOW_VAR} must be greater than zero"
                )));
            }
            config.count_window = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(LOG_FORMAT_VAR) {
            config.log_format = match raw.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(AppError::Config(format!(
                        "{LOG_FORMAT_VAR} must be json or pretty, got {other:?}"
                    )));
                }
            };
        }

        Ok(config)
    }
}
