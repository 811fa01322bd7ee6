//! Transaction subsystem.
//!
//! # Data Flow
//! ```text
//! TransactionRequest (eth_sendTransaction params[0])
//!     → builder.rs: NonceLocks.acquire(wallet, space)
//!     → builder.rs: read_nonce (getCode, readNonce) → MetaTransaction
//!     → signing.rs: payload + digest + wallet signature → execute calldata
//!     → relay::RelayClient: eth_sendTransaction → relay id
//!     → confirmation.rs: poll im_getTransactionByHash → hash
//! ```
//!
//! # Design Decisions
//! - The nonce lock is held until the transaction settles
//! - Only "not final yet" is retried; every other failure ends the send

pub mod builder;
pub mod confirmation;
pub mod pipeline;
pub mod signing;

use thiserror::Error;

use crate::blockchain::ChainError;
use crate::relay::RelayError;
use crate::wallet::{NonceError, PayloadError, SignatureError, SignerError};

pub use builder::{
    build_meta_transactions, get_nonce, read_nonce, MetaTransaction, NonceGuard, NonceLocks, NonceRead,
    TransactionRequest,
};
pub use confirmation::{wait_for_relayed, wait_for_transaction, ConfirmationError};
pub use pipeline::TransactionPipeline;
pub use signing::sign_meta_transactions;

/// Anything that can stop a send.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid transaction request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Nonce(#[from] NonceError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),
}
