//! Configuration validation.
//!
//! Semantic checks only; serde handles the syntax. Every problem is reported,
//! not just the first one.

use std::fmt;

use alloy::primitives::{Address, U256};

use crate::config::schema::{NonceConfig, ProviderConfig, SignerKind};
use crate::wallet::nonce::MAX_SPACE;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl NonceConfig {
    /// Parse the configured nonce space; empty means space 0.
    pub fn parsed_space(&self) -> Result<U256, String> {
        let raw = self.space.trim();
        if raw.is_empty() {
            return Ok(U256::ZERO);
        }
        let space: U256 = raw
            .parse()
            .map_err(|e| format!("invalid nonce space '{}': {}", raw, e))?;
        if space > MAX_SPACE {
            return Err(format!("nonce space {} does not fit in 160 bits", space));
        }
        Ok(space)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProviderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.chain_id == 0 {
        errors.push(ValidationError::new("chain.chain_id", "must be greater than 0"));
    }
    if config.chain.chain_name.trim().is_empty() {
        errors.push(ValidationError::new("chain.chain_name", "must not be empty"));
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }
    check_url(&mut errors, "chain.rpc_url", &config.chain.rpc_url);
    check_url(&mut errors, "relay.base_url", &config.relay.base_url);
    check_url(&mut errors, "registration.base_url", &config.registration.base_url);

    if config.relay.request_timeout_secs == 0 {
        errors.push(ValidationError::new("relay.request_timeout_secs", "must be greater than 0"));
    }
    if config.confirmation.max_attempts == 0 {
        errors.push(ValidationError::new("confirmation.max_attempts", "must be greater than 0"));
    }
    if config.confirmation.poll_interval_ms == 0 {
        errors.push(ValidationError::new("confirmation.poll_interval_ms", "must be greater than 0"));
    }
    if let Err(e) = config.nonce.parsed_space() {
        errors.push(ValidationError::new("nonce.space", e));
    }

    match config.signer.kind {
        SignerKind::Local => {
            if config.signer.private_key_env.trim().is_empty() {
                errors.push(ValidationError::new(
                    "signer.private_key_env",
                    "required for the local signer",
                ));
            }
        }
        SignerKind::Remote => {
            match &config.signer.remote_url {
                Some(url) => check_url(&mut errors, "signer.remote_url", url),
                None => errors.push(ValidationError::new(
                    "signer.remote_url",
                    "required for the remote signer",
                )),
            }
            match &config.signer.remote_address {
                Some(addr) if addr.parse::<Address>().is_err() => errors.push(
                    ValidationError::new("signer.remote_address", format!("invalid address '{}'", addr)),
                ),
                Some(_) => {}
                None => errors.push(ValidationError::new(
                    "signer.remote_address",
                    "required for the remote signer",
                )),
            }
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = url::Url::parse(value) {
        errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e)));
    }
}
