use std::error::Error;
use std::fmt;

/// Represents errors that can occur in Ethereum client operations
#[derive(Debug, Clone)]
pub enum EthereumClientError {
    /// Network-level failure reaching the RPC endpoint
    NetworkError(String),
    /// The node returned a JSON-RPC error object
    RpcError(String),
    /// Response or calldata could not be decoded
    ParseError(String),
    /// Configuration error
    ConfigError(String),
}

impl fmt::Display for EthereumClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EthereumClientError::NetworkError(msg) => write!(f, "RPC network error: {}", msg),
            EthereumClientError::RpcError(msg) => write!(f, "RPC error: {}", msg),
            EthereumClientError::ParseError(msg) => write!(f, "RPC parse error: {}", msg),
            EthereumClientError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for EthereumClientError {}
