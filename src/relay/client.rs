//! Relay JSON-RPC client.
//!
//! # Responsibilities
//! - Wrap each call in a JSON-RPC 2.0 envelope with a fresh request id
//! - Authenticate with the session's bearer token
//! - Turn HTTP, body and `error` failures into [`RelayError`]
//!
//! # Design Decisions
//! - No retries here; the confirmation loop decides what to poll again
//! - Error bodies are previewed, never echoed whole

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, Bytes};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::blockchain::ChainId;
use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::types::{
    error_message, preview_body, FeeOption, FeeOptionsParams, JsonRpcRequest, RelayError,
    RelayerTransaction, SendTransactionParams, SignParams, SignTypedDataParams,
};
use crate::session::SessionManager;

/// Client for the relay's `/v1/transactions` endpoint.
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
    session: Arc<dyn SessionManager>,
    next_id: AtomicU64,
}

impl RelayClient {
    pub fn new(config: &RelayConfig, session: Arc<dyn SessionManager>) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = format!("{}/v1/transactions", config.base_url.trim_end_matches('/'));
        tracing::debug!(endpoint = %endpoint, "Relay client initialized");

        Ok(Self {
            http,
            endpoint,
            session,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit `execute` calldata for `to`; returns the relay's transaction id.
    pub async fn eth_send_transaction(
        &self,
        to: Address,
        data: &Bytes,
        chain_id: ChainId,
    ) -> Result<String, RelayError> {
        let params = [SendTransactionParams {
            to,
            data,
            chain_id: chain_id.caip2(),
        }];
        self.call("eth_sendTransaction", params).await
    }

    pub async fn im_get_transaction_by_hash(
        &self,
        relay_id: &str,
    ) -> Result<RelayerTransaction, RelayError> {
        self.call("im_getTransactionByHash", [relay_id]).await
    }

    pub async fn im_get_fee_options(
        &self,
        user_address: Address,
        data: &Bytes,
        chain_id: ChainId,
    ) -> Result<Vec<FeeOption>, RelayError> {
        let params = [FeeOptionsParams {
            user_address,
            data,
            chain_id: chain_id.caip2(),
        }];
        self.call("im_getFeeOptions", params).await
    }

    /// Ask the relay to sign `message` on behalf of the wallet.
    pub async fn im_sign(
        &self,
        address: Address,
        message: &str,
        chain_id: ChainId,
    ) -> Result<String, RelayError> {
        let params = [SignParams {
            address,
            message,
            chain_id: chain_id.caip2(),
        }];
        self.call("im_sign", params).await
    }

    pub async fn im_sign_typed_data(
        &self,
        address: Address,
        payload: &Value,
        chain_id: ChainId,
    ) -> Result<String, RelayError> {
        let params = [SignTypedDataParams {
            address,
            eip712_payload: payload,
            chain_id: chain_id.caip2(),
        }];
        self.call("im_signTypedData", params).await
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R, RelayError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let user = self
            .session
            .current_user()
            .await
            .ok_or(RelayError::NoSession)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let started = Instant::now();
        let result = self.send(&user.access_token, &request).await;
        metrics::record_relay_request(method, result.is_ok(), started.elapsed());

        match &result {
            Ok(_) => tracing::debug!(method, id, "Relay call succeeded"),
            Err(e) => tracing::warn!(method, id, error = %e, "Relay call failed"),
        }
        result
    }

    async fn send<P, R>(&self, token: &str, request: &JsonRpcRequest<'_, P>) -> Result<R, RelayError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        if status >= 300 {
            return Err(RelayError::Status {
                status,
                preview: preview_body(&body),
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|_| RelayError::InvalidJson {
            preview: preview_body(&body),
        })?;

        if let Some(error) = parsed.get("error").filter(|e| !e.is_null()) {
            return Err(RelayError::Rpc(error_message(error)));
        }

        let result = parsed.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| RelayError::UnexpectedResult(e.to_string()))
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("endpoint", &self.endpoint)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
