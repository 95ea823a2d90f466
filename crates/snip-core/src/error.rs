use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors returned by [`Store`][crate::Store] implementations.
///
/// `NotFound` and `Gone` are outcomes rather than failures: callers render
/// them differently (404 vs 410), so they must never be folded together.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("short code has been deleted: {0}")]
    Gone(String),
    #[error("short code already taken: {0}")]
    CodeTaken(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, StorageError::Gone(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
