//! Errors returned from `request`.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::blockchain::ChainError;
use crate::provider::registration::RegistrationError;
use crate::relay::RelayError;
use crate::session::SessionError;
use crate::transaction::TransactionError;
use crate::wallet::SignerError;

pub const USER_REJECTED_REQUEST: i64 = 4001;
pub const UNAUTHORIZED: i64 = 4100;
pub const UNSUPPORTED_METHOD: i64 = 4200;
pub const INVALID_REQUEST: i64 = -32600;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// EIP-1193 style provider error: `{code, message, data?}`.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message} (code {code})")]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(
            UNAUTHORIZED,
            "Unauthorised - call eth_requestAccounts first",
        )
    }

    pub fn unsupported_method(method: &str) -> Self {
        Self::new(UNSUPPORTED_METHOD, format!("{}: Method not supported", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

impl From<TransactionError> for JsonRpcError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::InvalidRequest(_)
            | TransactionError::Nonce(_)
            | TransactionError::Payload(_) => Self::invalid_params(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<SessionError> for JsonRpcError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected => Self::new(USER_REJECTED_REQUEST, err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<RelayError> for JsonRpcError {
    fn from(err: RelayError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<ChainError> for JsonRpcError {
    fn from(err: ChainError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<SignerError> for JsonRpcError {
    fn from(err: SignerError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<RegistrationError> for JsonRpcError {
    fn from(err: RegistrationError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Errors building a provider.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Invalid provider configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let err = JsonRpcError::unauthorized();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], 4100);
        assert!(value.get("data").is_none());

        let err = JsonRpcError::internal("boom").with_data(json!({"relayId": "r-1"}));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, json!({"code": -32603, "message": "boom", "data": {"relayId": "r-1"}}));
    }

    #[test]
    fn test_transaction_error_mapping() {
        let err: JsonRpcError = TransactionError::InvalidRequest("no to".into()).into();
        assert_eq!(err.code, INVALID_PARAMS);

        let err: JsonRpcError = TransactionError::Relay(RelayError::Rpc("nope".into())).into();
        assert_eq!(err.code, INTERNAL_ERROR);
        assert_eq!(err.message, "Relay error: nope");
    }

    #[test]
    fn test_session_rejection_mapping() {
        let err: JsonRpcError = SessionError::Rejected.into();
        assert_eq!(err.code, USER_REJECTED_REQUEST);
    }
}
