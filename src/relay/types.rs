//! Relay protocol types.

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Longest body excerpt carried in an error.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Errors from the relay transport. None of these are retried.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No active session for relay request")]
    NoSession,

    #[error("Relay transport error: {0}")]
    Transport(String),

    #[error("Relay returned HTTP {status}: {preview}")]
    Status { status: u16, preview: String },

    #[error("Relay returned a non-JSON body: {preview}")]
    InvalidJson { preview: String },

    #[error("Relay error: {0}")]
    Rpc(String),

    #[error("Unexpected relay result: {0}")]
    UnexpectedResult(String),
}

/// Shorten a response body to at most [`PREVIEW_MAX_CHARS`] characters,
/// keeping its head and tail.
pub fn preview_body(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= PREVIEW_MAX_CHARS {
        return body.to_string();
    }
    let marker = "...";
    let tail_len = (PREVIEW_MAX_CHARS - marker.len()) / 2;
    let head_len = PREVIEW_MAX_CHARS - marker.len() - tail_len;
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{}{}{}", head, marker, tail)
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P> JsonRpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            id,
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Extract a human-readable message from a JSON-RPC `error` field.
pub fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => error.to_string(),
        },
        other => other.to_string(),
    }
}

/// Lifecycle state of a relayed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayerTransactionStatus {
    Pending,
    Submitted,
    Successful,
    Reverted,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RelayerTransactionStatus {
    /// No further status change is expected.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Successful | Self::Reverted | Self::Failed | Self::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::Successful => "SUCCESSFUL",
            Self::Reverted => "REVERTED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// A transaction as tracked by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerTransaction {
    pub status: RelayerTransactionStatus,
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub relayer_id: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Token a fee can be paid in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeToken {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub token_address: Option<String>,
}

/// A fee quote from the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeOption {
    pub token_price: String,
    pub token: FeeToken,
    pub recipient_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendTransactionParams<'a> {
    pub to: Address,
    pub data: &'a Bytes,
    pub chain_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeeOptionsParams<'a> {
    pub user_address: Address,
    pub data: &'a Bytes,
    pub chain_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignParams<'a> {
    pub address: Address,
    pub message: &'a str,
    pub chain_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignTypedDataParams<'a> {
    pub address: Address,
    pub eip712_payload: &'a Value,
    pub chain_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preview_short_body_untouched() {
        assert_eq!(preview_body("Internal Server Error"), "Internal Server Error");
    }

    #[test]
    fn test_preview_keeps_head_and_tail() {
        let body = format!("{}{}{}", "a".repeat(60), "b".repeat(100), "c".repeat(60));
        let preview = preview_body(&body);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(preview.starts_with(&"a".repeat(50)));
        assert!(preview.ends_with(&"c".repeat(48)));
        assert!(preview.contains("..."));
    }

    #[test]
    fn test_preview_is_char_safe() {
        let body = "é".repeat(150);
        assert_eq!(preview_body(&body).chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(&json!("bad request")), "bad request");
        assert_eq!(
            error_message(&json!({"code": -32000, "message": "nonce too low"})),
            "nonce too low"
        );
        assert_eq!(error_message(&json!(42)), "42");
    }

    #[test]
    fn test_status_parsing() {
        let tx: RelayerTransaction = serde_json::from_value(json!({
            "status": "REVERTED",
            "chainId": "eip155:13371",
            "relayerId": "r-1",
            "hash": "0xdead",
            "statusMessage": "insufficient funds"
        }))
        .unwrap();
        assert_eq!(tx.status, RelayerTransactionStatus::Reverted);
        assert!(tx.status.is_terminal());
        assert_eq!(tx.status_message.as_deref(), Some("insufficient funds"));

        let tx: RelayerTransaction =
            serde_json::from_value(json!({"status": "QUEUED"})).unwrap();
        assert_eq!(tx.status, RelayerTransactionStatus::Unknown);
        assert!(!tx.status.is_terminal());
        assert!(!RelayerTransactionStatus::Pending.is_terminal());
        assert!(!RelayerTransactionStatus::Submitted.is_terminal());
    }

    #[test]
    fn test_request_envelope() {
        let params = [SendTransactionParams {
            to: Address::ZERO,
            data: &Bytes::from_static(&[0xab]),
            chain_id: "eip155:1".to_string(),
        }];
        let value = serde_json::to_value(JsonRpcRequest::new(7, "eth_sendTransaction", params)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "jsonrpc": "2.0",
                "method": "eth_sendTransaction",
                "params": [{
                    "to": "0x0000000000000000000000000000000000000000",
                    "data": "0xab",
                    "chainId": "eip155:1"
                }]
            })
        );
    }
}
