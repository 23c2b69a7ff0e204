use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by match stores regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A persisted record could not be mapped back to a match.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }
}
