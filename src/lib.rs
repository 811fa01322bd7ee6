//! Smart-contract wallet transaction provider backed by a gas-sponsoring relay.

pub mod blockchain;
pub mod config;
pub mod observability;
pub mod provider;
pub mod relay;
pub mod resilience;
pub mod session;
pub mod transaction;
pub mod wallet;

pub use config::schema::ProviderConfig;
pub use provider::{JsonRpcError, RequestArguments, WalletRelayProvider};
