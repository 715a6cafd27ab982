use std::error::Error;
use std::fmt;

use crate::infrastructure::persistence::error::DbError;

/// Error type for queue operations
#[derive(Debug)]
pub enum QueueError {
    /// Error from the backing store
    DbError(DbError),
    /// Payload could not be encoded or decoded
    PayloadError(String),
    /// Other error
    Other(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::DbError(e) => write!(f, "Queue database error: {}", e),
            QueueError::PayloadError(msg) => write!(f, "Queue payload error: {}", msg),
            QueueError::Other(msg) => write!(f, "Queue error: {}", msg),
        }
    }
}

impl Error for QueueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QueueError::DbError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for QueueError {
    fn from(error: DbError) -> Self {
        QueueError::DbError(error)
    }
}

impl From<sea_orm::DbErr> for QueueError {
    fn from(error: sea_orm::DbErr) -> Self {
        QueueError::DbError(DbError::SeaOrmError(error))
    }
}
