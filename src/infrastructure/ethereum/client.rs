//! Ethereum JSON-RPC read client
//!
//! Batches independent ERC-20 reads through the Multicall3 contract so a
//! whole validation batch costs one round trip. Native balances have no
//! batching primitive and are fetched call-by-call.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::AppConfig;
use crate::infrastructure::ethereum::abi;
use crate::infrastructure::ethereum::abi::Call3;
use crate::infrastructure::ethereum::error::EthereumClientError;

/// Outcome of one sub-call inside a multicall batch
#[derive(Debug, Clone)]
pub enum MulticallOutcome {
    /// The call succeeded and decoded to a balance
    Balance(u128),
    /// The call failed or returned undecodable data; retry later
    Failed(String),
}

/// The on-chain reads the validation engine depends on
///
/// A trait seam so the validators can be exercised against scripted chain
/// state in tests.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current owner of a name token in the registrar contract
    async fn get_name_owner(&self, token_id: &str) -> Result<String, EthereumClientError>;

    /// Native ETH balance of an address, in wei
    async fn get_native_balance(&self, address: &str) -> Result<u128, EthereumClientError>;

    /// ERC-20 balances for many holders of one token, positionally aligned
    async fn batch_token_balances(
        &self,
        token_address: &str,
        holders: &[String],
    ) -> Result<Vec<MulticallOutcome>, EthereumClientError>;
}

/// Read-only client for the Ethereum JSON-RPC API
pub struct EthereumClient {
    client: Client,
    endpoint: String,
    multicall_address: String,
    registry_address: String,
}

impl EthereumClient {
    /// Create a new Ethereum client
    pub fn new(config: &AppConfig) -> Result<Self, EthereumClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ethereum.rpc_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                EthereumClientError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(EthereumClient {
            client,
            endpoint: config.ethereum.rpc_url.clone(),
            multicall_address: config.ethereum.multicall_address.clone(),
            registry_address: config.ethereum.registry_address.clone(),
        })
    }

    /// Make a JSON-RPC call to the node
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, EthereumClientError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EthereumClientError::NetworkError(e.to_string()))?;

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| EthereumClientError::ParseError(e.to_string()))?;

        if let Some(error) = response_json.get("error") {
            return Err(EthereumClientError::RpcError(error.to_string()));
        }

        response_json
            .get("result")
            .cloned()
            .ok_or_else(|| EthereumClientError::ParseError("No result in response".to_string()))
    }

    /// eth_call against a contract, returning the raw return data
    async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, EthereumClientError> {
        let result = self
            .rpc_call(
                "eth_call",
                json!([{ "to": to, "data": abi::encode_hex(data) }, "latest"]),
            )
            .await?;

        let hex_str = result
            .as_str()
            .ok_or_else(|| EthereumClientError::ParseError("eth_call result not a string".to_string()))?;
        abi::decode_hex(hex_str)
    }
}

#[async_trait]
impl ChainReader for EthereumClient {
    async fn get_name_owner(&self, token_id: &str) -> Result<String, EthereumClientError> {
        let call_data = abi::encode_owner_of(token_id)?;
        let return_data = self.eth_call(&self.registry_address, &call_data).await?;
        abi::decode_address(&return_data)
    }

    async fn get_native_balance(&self, address: &str) -> Result<u128, EthereumClientError> {
        let result = self
            .rpc_call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let hex_str = result.as_str().ok_or_else(|| {
            EthereumClientError::ParseError("eth_getBalance result not a string".to_string())
        })?;
        abi::parse_quantity(hex_str)
    }

    /// Fetch many ERC-20 balances in one round trip via Multicall3
    ///
    /// Every sub-call is issued with allowFailure, so one bad holder never
    /// poisons the batch: its slot comes back as `Failed` while the rest
    /// carry balances. The result vector is positionally aligned with the
    /// input.
    async fn batch_token_balances(
        &self,
        token_address: &str,
        holders: &[String],
    ) -> Result<Vec<MulticallOutcome>, EthereumClientError> {
        if holders.is_empty() {
            return Ok(Vec::new());
        }

        let mut calls = Vec::with_capacity(holders.len());
        for holder in holders {
            calls.push(Call3 {
                target: token_address.to_string(),
                allow_failure: true,
                call_data: abi::encode_balance_of(holder)?,
            });
        }

        let call_data = abi::encode_aggregate3(&calls)?;
        let return_data = self.eth_call(&self.multicall_address, &call_data).await?;
        let results = abi::decode_aggregate3(&return_data)?;

        if results.len() != holders.len() {
            return Err(EthereumClientError::ParseError(format!(
                "Multicall returned {} results for {} calls",
                results.len(),
                holders.len()
            )));
        }

        Ok(results
            .into_iter()
            .map(|r| {
                if !r.success {
                    return MulticallOutcome::Failed("sub-call reverted".to_string());
                }
                match abi::decode_uint_as_u128(&r.return_data) {
                    Ok(balance) => MulticallOutcome::Balance(balance),
                    Err(e) => MulticallOutcome::Failed(e.to_string()),
                }
            })
            .collect())
    }
}
