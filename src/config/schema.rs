//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the provider.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay provider.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// Target chain and its JSON-RPC endpoint.
    pub chain: ChainConfig,

    /// Gas-sponsoring relay service.
    pub relay: RelayConfig,

    /// Counterfactual address registration service.
    pub registration: RegistrationConfig,

    /// Confirmation polling budget.
    pub confirmation: ConfirmationConfig,

    /// Nonce space used for sent transactions.
    pub nonce: NonceConfig,

    /// Signing key strategy.
    pub signer: SignerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain ID (e.g., 13371 for Immutable zkEVM mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Chain name used in registration paths.
    pub chain_name: String,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            chain_name: "anvil".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Relay service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL; requests go to `{base_url}/v1/transactions`.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8073/relayer-mr".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Registration service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Base URL; requests go to `{base_url}/v1/counterfactual-address/{chain_name}`.
    pub base_url: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8073/passport-mr".to_string(),
        }
    }
}

/// Confirmation polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Fixed delay between relay status polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum number of status polls before giving up.
    pub max_attempts: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_attempts: 30,
        }
    }
}

/// Nonce configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NonceConfig {
    /// Nonce space as a decimal or `0x` hex string (must fit in 160 bits).
    pub space: String,
}

/// Which signing strategy backs the user's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
    /// Raw private key held in-process.
    #[default]
    Local,
    /// Remote identity service bound to the session.
    Remote,
}

/// Signer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Signing strategy.
    pub kind: SignerKind,

    /// Environment variable holding the hex private key (local signer).
    pub private_key_env: String,

    /// Base URL of the remote signing service (remote signer).
    pub remote_url: Option<String>,

    /// EOA address managed by the remote signing service (remote signer).
    pub remote_address: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            kind: SignerKind::Local,
            private_key_env: "WALLET_RELAY_PRIVATE_KEY".to_string(),
            remote_url: None,
            remote_address: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
