//! Error types for plexunify
//!
//! Provider failures are split by recoverability: a permanent failure ends
//! processing of one movie, a transient one that outlived its retries ends
//! the run (after a flush).

use thiserror::Error;

/// Failure reported by an external metadata source
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Network timeout or connection error; eligible for retry
    #[error("Transient provider failure: {0}")]
    Transient(String),

    /// Unresolvable id, missing required field, rejected request
    #[error("Permanent provider failure: {0}")]
    Permanent(String),

    /// Transient failures outlasted the retry budget
    #[error("Gave up on {operation} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl ProviderError {
    /// True when the error should stop the whole run
    ///
    /// A `Transient` failure only reaches the engine when the caller did not
    /// retry it, so it counts as exhausted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::RetryExhausted { .. })
    }
}

/// Engine error type
#[derive(Debug, Error)]
pub enum UnifyError {
    /// External provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Catalog query or write failure
    #[error("Catalog error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (backups, poster files, prompt)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// plexunify-common error
    #[error("Common error: {0}")]
    Common(#[from] plexunify_common::Error),

    /// Inconsistent catalog contents (dangling ids, missing rows)
    #[error("Catalog inconsistency: {0}")]
    Catalog(String),
}

impl UnifyError {
    /// Per-movie recoverable failure
    pub fn is_permanent_provider_failure(&self) -> bool {
        matches!(self, UnifyError::Provider(ProviderError::Permanent(_)))
    }

    /// Provider failure that ends the run once staged work is flushed
    pub fn stops_run(&self) -> bool {
        matches!(self, UnifyError::Provider(e) if e.is_fatal())
    }
}

/// Result type for engine operations
pub type UnifyResult<T> = Result<T, UnifyError>;
