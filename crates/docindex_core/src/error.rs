//! Error types for docindex core.

use docindex_kv::KvError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in docindex core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input. Never retried.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what was wrong.
        message: String,
    },

    /// An insert-if-absent on a registry name neither succeeded nor left a
    /// readable value behind.
    #[error("registry insert for {name:?} unresolved after {attempts} attempts")]
    RetryExceeded {
        /// The composite name being registered.
        name: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A retryable engine failure persisted past the retry budget.
    #[error("I/O failure after {attempts} attempts: {source}")]
    Io {
        /// Number of attempts made.
        attempts: u32,
        /// The last engine error.
        #[source]
        source: KvError,
    },

    /// Any other engine failure, surfaced as-is.
    #[error("engine error: {0}")]
    Engine(#[from] KvError),

    /// Stored index data could not be decoded.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true for caller-side input errors.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
