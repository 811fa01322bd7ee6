//! Chain JSON-RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to the chain's JSON-RPC endpoint
//! - Read wallet code and contract state
//! - Forward read-only JSON-RPC methods verbatim
//! - Bound every call with the configured timeout

use std::borrow::Cow;
use std::future::IntoFuture;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportResult;
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;

use crate::blockchain::types::{ChainError, ChainId, ChainResult};
use crate::config::ChainConfig;

/// Read access to the chain used by the transaction pipeline and passthrough.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Deployed bytecode at `address` (empty if none).
    async fn get_code(&self, address: Address) -> ChainResult<Bytes>;

    /// `eth_call` against `to` at the latest block.
    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes>;

    /// Forward an arbitrary JSON-RPC method.
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value>;
}

/// Chain RPC client over HTTP.
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    config: ChainConfig,
    timeout_duration: Duration,
}

impl ChainClient {
    /// Create a new chain client. Does not touch the network.
    pub fn new(config: ChainConfig) -> ChainResult<Self> {
        let url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Config(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            "Chain client initialized"
        );

        Ok(Self {
            provider,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            config,
        })
    }

    pub fn chain_id(&self) -> ChainId {
        ChainId(self.config.chain_id)
    }

    async fn bounded<T, F>(&self, what: &'static str, fut: F) -> ChainResult<T>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        match timeout(self.timeout_duration, fut.into_future()).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                tracing::warn!(call = what, error = %e, "RPC error");
                Err(ChainError::Rpc(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(call = what, "RPC timeout");
                Err(ChainError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }
}

#[async_trait]
impl ChainRpc for ChainClient {
    async fn get_code(&self, address: Address) -> ChainResult<Bytes> {
        self.bounded("eth_getCode", self.provider.get_code_at(address)).await
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.bounded("eth_call", self.provider.call(tx)).await
    }

    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let method: Cow<'static, str> = Cow::Owned(method.to_string());
        self.bounded(
            "passthrough",
            self.provider.raw_request::<Value, Value>(method, params),
        )
        .await
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChainConfig {
        ChainConfig {
            chain_id: 31337, // Anvil default
            chain_name: "anvil".to_string(),
            rpc_url: "http://127.0.0.1:9".to_string(),
            rpc_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn test_client_creation() {
        // Creation never touches the network
        let client = ChainClient::new(test_config()).unwrap();
        assert_eq!(client.chain_id(), ChainId(31337));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        let err = ChainClient::new(config).unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }

    #[tokio::test]
    async fn test_unreachable_rpc_is_an_error() {
        let client = ChainClient::new(test_config()).unwrap();
        let result = client.get_code(Address::ZERO).await;
        assert!(result.is_err());
    }
}
