use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or the query failed.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The addressed round or participant does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing record.
        what: String,
    },
    /// A concurrent writer won a race on the same natural key. Callers
    /// re-fetch and retry once; a second conflict is terminal.
    #[error("storage conflict: {message}")]
    Conflict {
        /// Human readable description of the collision.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a not-found error for the given record description.
    pub fn not_found(what: impl Into<String>) -> Self {
        StorageError::NotFound { what: what.into() }
    }

    /// Construct a conflict error for a lost insert race.
    pub fn conflict(message: impl Into<String>) -> Self {
        StorageError::Conflict {
            message: message.into(),
        }
    }
}
