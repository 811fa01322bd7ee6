//! Chain access subsystem.
//!
//! # Data Flow
//! ```text
//! ChainConfig (RPC URL, chain ID, timeout)
//!     → client.rs (alloy HTTP provider, bounded calls)
//!     → ChainRpc: get_code / call / request
//!         → transaction::builder (wallet deployment + nonce reads)
//!         → provider::passthrough (read-only JSON-RPC forwarding)
//! ```

pub mod client;
pub mod types;

pub use client::{ChainClient, ChainRpc};
pub use types::{ChainError, ChainId, ChainResult};
