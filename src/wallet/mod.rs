//! Smart-contract wallet encoding and signing.
//!
//! # Data Flow
//! ```text
//! EncodedNonce (nonce.rs)
//!     → CallsPayload (payload.rs): packed bytes + EIP-712 hash
//!     → DigestSigner (signer.rs): raw signature over the hash
//!     → SignatureShare / WalletSignature (signature.rs): normalized + tree-encoded
//!     → IWallet.execute(payload, signature) (abi.rs)
//! ```

pub mod abi;
pub mod nonce;
pub mod payload;
pub mod signature;
pub mod signer;

pub use nonce::{encode_nonce, EncodedNonce, NonceError};
pub use payload::{payload_hash, BehaviorOnError, Call, CallsPayload, PayloadError};
pub use signature::{
    SignatureError, SignatureScheme, SignatureShare, SignedLeaf, SignerTopology, WalletSignature,
};
pub use signer::{DigestSigner, LocalSigner, RemoteSigner, SignerError};
