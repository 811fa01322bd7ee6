//! Bit-packed wallet nonces.
//!
//! A wallet nonce is a single `uint256` carrying two values:
//!
//! ```text
//!  255            96 95              0
//! ┌─────────────────┬─────────────────┐
//! │ space (uint160) │ sequence (u96)  │
//! └─────────────────┴─────────────────┘
//! ```
//!
//! Each space is an independent sequence for the same wallet.

use alloy::primitives::U256;
use thiserror::Error;

/// Bit width of the sequence part.
pub const SEQUENCE_BITS: usize = 96;

/// Largest valid nonce space (`2^160 - 1`).
pub const MAX_SPACE: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);

/// Largest valid sequence (`2^96 - 1`).
pub const MAX_SEQUENCE: U256 = U256::from_limbs([u64::MAX, u32::MAX as u64, 0, 0]);

/// Nonce range errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce space {0} exceeds 160 bits")]
    SpaceOutOfRange(U256),

    #[error("nonce sequence {0} exceeds 96 bits")]
    SequenceOutOfRange(U256),
}

/// A `(space, sequence)` pair that is guaranteed to pack losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedNonce {
    space: U256,
    sequence: U256,
}

impl EncodedNonce {
    /// Build a nonce, rejecting values that would overlap when packed.
    pub fn new(space: U256, sequence: U256) -> Result<Self, NonceError> {
        if space > MAX_SPACE {
            return Err(NonceError::SpaceOutOfRange(space));
        }
        if sequence > MAX_SEQUENCE {
            return Err(NonceError::SequenceOutOfRange(sequence));
        }
        Ok(Self { space, sequence })
    }

    /// Split a packed nonce. Every `uint256` unpacks to a valid pair.
    pub fn unpack(encoded: U256) -> Self {
        Self {
            space: encoded >> SEQUENCE_BITS,
            sequence: encoded & MAX_SEQUENCE,
        }
    }

    /// `sequence + space * 2^96`.
    pub fn pack(&self) -> U256 {
        (self.space << SEQUENCE_BITS) | self.sequence
    }

    pub fn space(&self) -> U256 {
        self.space
    }

    pub fn sequence(&self) -> U256 {
        self.sequence
    }
}

impl From<EncodedNonce> for U256 {
    fn from(nonce: EncodedNonce) -> Self {
        nonce.pack()
    }
}

/// Pack `(space, sequence)` into a single wallet nonce.
pub fn encode_nonce(space: U256, sequence: U256) -> Result<U256, NonceError> {
    EncodedNonce::new(space, sequence).map(|n| n.pack())
}
