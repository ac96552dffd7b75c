//! services/notifier/src/error.rs
//!
//! Defines the primary error type for the notifier service.

use crate::config::ConfigError;
use crate::scheduler::TriggerError;

/// The primary error type for the `notifier` service.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A pass could not be started.
    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
