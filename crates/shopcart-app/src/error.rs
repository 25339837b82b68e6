//! Shopping cart application error types.

use shopcart_core::error::DomainError;
use shopcart_summary::error::ProjectionError;
use thiserror::Error;

/// Startup and runtime errors for the console application.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A command was rejected or the event log failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The summary projection failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// A console line could not be understood.
    #[error("{0}")]
    Console(String),

    /// Reading input or writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Returns `true` if the session can continue after reporting this
    /// error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Console(_) => true,
            Self::Domain(e) => !matches!(e, DomainError::Infrastructure(_)),
            Self::Projection(e) => e.is_integrity_fault(),
            Self::Config(_) | Self::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_and_typos_are_recoverable() {
        assert!(AppError::Console("unknown command".into()).is_recoverable());
        assert!(
            AppError::Domain(DomainError::DuplicateArticle {
                cart_id: "C1".into(),
                article: "pen".into(),
            })
            .is_recoverable()
        );
    }

    #[test]
    fn test_infrastructure_failures_are_fatal() {
        let log_closed = DomainError::Infrastructure("log closed".into());
        assert!(!AppError::Domain(log_closed).is_recoverable());
        assert!(!AppError::Config("bad window".into()).is_recoverable());
        assert!(!AppError::Projection(ProjectionError::Storage("down".into())).is_recoverable());
    }

    #[test]
    fn test_domain_error_message_passes_through() {
        let err = AppError::from(DomainError::AggregateNotFound("C9".into()));

        assert_eq!(
            err.to_string(),
            DomainError::AggregateNotFound("C9".into()).to_string()
        );
    }
}
