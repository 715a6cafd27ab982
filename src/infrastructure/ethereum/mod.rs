pub mod abi;
pub mod client;
pub mod error;

pub use client::{ChainReader, EthereumClient, MulticallOutcome};
pub use error::EthereumClientError;
