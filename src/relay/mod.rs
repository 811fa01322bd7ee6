//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! transaction::signing (execute calldata)
//!     → client.rs: eth_sendTransaction → relay id
//!     → client.rs: im_getTransactionByHash → RelayerTransaction (types.rs)
//!         → transaction::confirmation
//! provider (personal_sign, eth_signTypedData)
//!     → client.rs: im_sign / im_signTypedData
//! ```

pub mod client;
pub mod types;

pub use client::RelayClient;
pub use types::{
    FeeOption, FeeToken, RelayError, RelayerTransaction, RelayerTransactionStatus,
};
