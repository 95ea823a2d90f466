use snip_core::{CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("deletion queue is full")]
    QueueFull,
    #[error("deletion pipeline is shut down")]
    Closed,
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code has been deleted: {0}")]
    Gone(String),
    #[error("deletion rejected: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl ShortenerError {
    /// HTTP status an adapter should answer with for this error.
    pub fn status_hint(&self) -> u16 {
        match self {
            ShortenerError::InvalidUrl(_) | ShortenerError::InvalidShortCode(_) => 400,
            ShortenerError::NotFound(_) => 404,
            ShortenerError::Gone(_) => 410,
            ShortenerError::Pipeline(PipelineError::QueueFull) => 503,
            ShortenerError::Pipeline(PipelineError::Closed) | ShortenerError::Storage(_) => 500,
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(message) => Self::NotFound(message),
            StorageError::Gone(message) => Self::Gone(message),
            other => Self::Storage(other),
        }
    }
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}
