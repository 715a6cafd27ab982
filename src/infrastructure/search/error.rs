use std::error::Error;
use std::fmt;

/// Error type for search index operations
#[derive(Debug)]
pub enum SearchError {
    /// Network-level failure talking to the index
    NetworkError(String),
    /// The index returned a non-success status
    IndexError(String),
    /// Response could not be decoded
    ResponseError(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::NetworkError(msg) => write!(f, "Search network error: {}", msg),
            SearchError::IndexError(msg) => write!(f, "Search index error: {}", msg),
            SearchError::ResponseError(msg) => write!(f, "Search response error: {}", msg),
        }
    }
}

impl Error for SearchError {}

impl From<reqwest::Error> for SearchError {
    fn from(error: reqwest::Error) -> Self {
        SearchError::NetworkError(error.to_string())
    }
}
