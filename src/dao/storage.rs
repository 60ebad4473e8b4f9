use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
///
/// The split matters to the storage supervisor: an unreachable backend is
/// worth retrying with backoff, a broken configuration is not.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend configuration is unusable until an operator fixes it.
    #[error("storage misconfigured: {message}")]
    Misconfigured {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
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

    /// Construct a misconfiguration error from any backend failure.
    pub fn misconfigured(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Misconfigured {
            message,
            source: Box::new(source),
        }
    }

    /// Whether retrying can ever succeed without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}
