use std::error::Error;
use std::fmt;

use crate::infrastructure::ethereum::EthereumClientError;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::queue::QueueError;
use crate::infrastructure::search::SearchError;

/// Error type for funding validation and expiry work
#[derive(Debug)]
pub enum ValidationError {
    DbError(DbError),
    RpcError(EthereumClientError),
    QueueError(QueueError),
    /// The entity vanished before the job ran; the job completes as a no-op
    NotFound(String),
    ProcessingError(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DbError(e) => write!(f, "Database error: {}", e),
            ValidationError::RpcError(e) => write!(f, "RPC error: {}", e),
            ValidationError::QueueError(e) => write!(f, "Queue error: {}", e),
            ValidationError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ValidationError::ProcessingError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ValidationError::DbError(e) => Some(e),
            ValidationError::RpcError(e) => Some(e),
            ValidationError::QueueError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for ValidationError {
    fn from(error: DbError) -> Self {
        ValidationError::DbError(error)
    }
}

impl From<EthereumClientError> for ValidationError {
    fn from(error: EthereumClientError) -> Self {
        ValidationError::RpcError(error)
    }
}

impl From<QueueError> for ValidationError {
    fn from(error: QueueError) -> Self {
        ValidationError::QueueError(error)
    }
}

/// Error type for the change-capture pipeline
#[derive(Debug)]
pub enum CaptureError {
    DbError(DbError),
    SearchError(SearchError),
    /// The listen connection or trigger setup failed; callers fall back to polling
    ListenError(String),
    /// A notification payload could not be decoded
    DecodeError(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DbError(e) => write!(f, "Database error: {}", e),
            CaptureError::SearchError(e) => write!(f, "Search error: {}", e),
            CaptureError::ListenError(msg) => write!(f, "Listen error: {}", msg),
            CaptureError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CaptureError::DbError(e) => Some(e),
            CaptureError::SearchError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for CaptureError {
    fn from(error: DbError) -> Self {
        CaptureError::DbError(error)
    }
}

impl From<SearchError> for CaptureError {
    fn from(error: SearchError) -> Self {
        CaptureError::SearchError(error)
    }
}
