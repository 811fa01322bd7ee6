//! Read-only JSON-RPC forwarding to the chain.

use serde_json::Value;

use crate::blockchain::ChainRpc;
use crate::provider::error::JsonRpcError;

/// Methods forwarded to the chain node as-is.
pub const PASSTHROUGH_METHODS: &[&str] = &[
    "eth_chainId",
    "eth_getBalance",
    "eth_getCode",
    "eth_getTransactionCount",
    "eth_getStorageAt",
    "eth_call",
    "eth_estimateGas",
    "eth_gasPrice",
    "eth_blockNumber",
    "eth_getBlockByHash",
    "eth_getBlockByNumber",
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
];

const DEFAULT_BLOCK_TAG: &str = "latest";

pub fn is_passthrough(method: &str) -> bool {
    PASSTHROUGH_METHODS.contains(&method)
}

/// Index of the trailing block tag parameter, for methods that take one.
fn block_tag_index(method: &str) -> Option<usize> {
    match method {
        "eth_getBalance" | "eth_getCode" | "eth_getTransactionCount" | "eth_call"
        | "eth_estimateGas" => Some(1),
        "eth_getStorageAt" => Some(2),
        _ => None,
    }
}

/// Coerce `params` to an array and default a missing or `null` block tag to
/// `"latest"`.
pub fn normalize_params(method: &str, params: Value) -> Result<Value, JsonRpcError> {
    let mut params = match params {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => {
            return Err(JsonRpcError::invalid_params(format!(
                "{} expects an array of params, got {}",
                method, other
            )))
        }
    };

    if let Some(index) = block_tag_index(method) {
        let latest = Value::String(DEFAULT_BLOCK_TAG.to_string());
        if params.len() == index {
            params.push(latest);
        } else if let Some(tag) = params.get_mut(index).filter(|tag| tag.is_null()) {
            *tag = latest;
        }
    }
    Ok(Value::Array(params))
}

/// Forward `method` to the chain node.
pub async fn forward(
    chain: &dyn ChainRpc,
    method: &str,
    params: Value,
) -> Result<Value, JsonRpcError> {
    let params = normalize_params(method, params)?;
    tracing::debug!(method, "Forwarding to chain");
    Ok(chain.request(method, params).await?)
}
