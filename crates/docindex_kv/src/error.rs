//! Error types for key-value engine operations.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur inside a key-value engine.
///
/// Callers never match on engine internals; they use
/// [`KvError::is_retryable`] and [`KvError::is_input_error`] to decide how
/// to react.
#[derive(Debug, Error)]
pub enum KvError {
    /// A concurrent transaction modified data this transaction read or wrote.
    #[error("transaction conflict in table {table}")]
    Conflict {
        /// Table where the conflicting key lives.
        table: String,
    },

    /// The caller passed something the engine cannot accept.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored data could not be interpreted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the data directory lock.
    #[error("data directory locked: another process has exclusive access")]
    Locked,

    /// Snapshot encoding or decoding failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl KvError {
    /// Creates a conflict error for the given table.
    pub fn conflict(table: impl Into<String>) -> Self {
        Self::Conflict {
            table: table.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns true if retrying the whole transaction may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the error was caused by the caller's input.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}
