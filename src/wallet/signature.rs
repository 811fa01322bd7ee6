//! Signature normalization and the wallet's signature-tree encoding.
//!
//! # Encoded layout
//! ```text
//! flag (1)
//!   bits 2-4 checkpoint byte length (0..=7)
//!   bit 5    threshold is 2 bytes
//! [checkpoint (n)] threshold (1|2)
//! per signed leaf:
//!   (leaf flag << 4) | weight   (weight 0 means "read one more byte")
//!   [weight (1)]
//!   r (32)
//!   s | y_parity << 255 (32)
//! ```

use alloy::primitives::{Address, Bytes, B256, U256};
use thiserror::Error;

const LEAF_FLAG_HASH: u8 = 0x0;
const LEAF_FLAG_ETH_SIGN: u8 = 0x7;
const MAX_CHECKPOINT_BYTES: usize = 7;

/// Signature parsing and encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature: expected 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("malformed signature: invalid recovery value {0}")]
    InvalidRecoveryId(u8),

    #[error("malformed signature: invalid hex ({0})")]
    InvalidHex(String),

    #[error("signature s value has its top bit set and cannot be packed")]
    HighS,

    #[error("checkpoint {0} does not fit in 7 bytes")]
    CheckpointTooLarge(u64),

    #[error("signature topology has no signed leaves")]
    EmptyTopology,

    #[error("encoded signature truncated at byte {0}")]
    Truncated(usize),

    #[error("unsupported signature leaf flag {0:#x}")]
    UnsupportedLeaf(u8),
}

/// ECDSA signature split into the parts the wallet verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureShare {
    pub r: B256,
    pub s: B256,
    pub y_parity: u8,
}

impl SignatureShare {
    /// Parse a raw signature.
    ///
    /// Accepts `r ‖ s ‖ v` (65 bytes, `v` in `{0, 1, 27, 28}`) or the 64-byte
    /// compact form where the parity lives in the top bit of `s`.
    pub fn from_raw(raw: &[u8]) -> Result<Self, SignatureError> {
        let expanded = match raw.len() {
            64 => expand_compact(raw),
            _ => raw.to_vec(),
        };
        if expanded.len() != 65 {
            return Err(SignatureError::InvalidLength(expanded.len()));
        }

        let v = expanded[64];
        let y_parity = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            other => return Err(SignatureError::InvalidRecoveryId(other)),
        };

        Ok(Self {
            r: B256::from_slice(&expanded[..32]),
            s: B256::from_slice(&expanded[32..64]),
            y_parity,
        })
    }

    /// Parse a `0x`-prefixed (or bare) hex signature.
    pub fn from_hex(hex: &str) -> Result<Self, SignatureError> {
        let raw = alloy::hex::decode(hex).map_err(|e| SignatureError::InvalidHex(e.to_string()))?;
        Self::from_raw(&raw)
    }

    /// `r ‖ s ‖ (27 + y_parity)`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = 27 + self.y_parity;
        out
    }

    /// Address that produced this signature over `prehash`.
    pub fn recover(&self, prehash: B256) -> Option<Address> {
        let signature = alloy::primitives::Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            self.y_parity == 1,
        );
        signature.recover_address_from_prehash(&prehash).ok()
    }

    fn packed_s(&self) -> Result<[u8; 32], SignatureError> {
        let mut s = self.s.0;
        if s[0] & 0x80 != 0 {
            return Err(SignatureError::HighS);
        }
        if self.y_parity == 1 {
            s[0] |= 0x80;
        }
        Ok(s)
    }
}

fn expand_compact(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(65);
    out.extend_from_slice(&raw[..32]);
    let y_parity = raw[32] >> 7;
    out.push(raw[32] & 0x7f);
    out.extend_from_slice(&raw[33..64]);
    out.push(y_parity);
    out
}

/// How the signed digest was presented to the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Raw digest.
    Hash,
    /// EIP-191 personal-message transform of the digest.
    EthSign,
}

impl SignatureScheme {
    fn leaf_flag(self) -> u8 {
        match self {
            Self::Hash => LEAF_FLAG_HASH,
            Self::EthSign => LEAF_FLAG_ETH_SIGN,
        }
    }

    fn from_leaf_flag(flag: u8) -> Option<Self> {
        match flag {
            LEAF_FLAG_HASH => Some(Self::Hash),
            LEAF_FLAG_ETH_SIGN => Some(Self::EthSign),
            _ => None,
        }
    }
}

/// A signer leaf that carries a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLeaf {
    /// Signer address; not encoded, the wallet recovers it.
    pub address: Address,
    pub weight: u8,
    pub scheme: SignatureScheme,
    pub share: SignatureShare,
}

/// The signers taking part in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignerTopology {
    pub leaves: Vec<SignedLeaf>,
}

impl SignerTopology {
    pub fn single(leaf: SignedLeaf) -> Self {
        Self { leaves: vec![leaf] }
    }

    pub fn total_weight(&self) -> u32 {
        self.leaves.iter().map(|l| l.weight as u32).sum()
    }
}

/// Full wallet signature: threshold, checkpoint and topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSignature {
    pub threshold: u16,
    pub checkpoint: u64,
    pub topology: SignerTopology,
}

impl WalletSignature {
    /// Encode to the wallet's signature byte format.
    pub fn encode(&self) -> Result<Bytes, SignatureError> {
        if self.topology.leaves.is_empty() {
            return Err(SignatureError::EmptyTopology);
        }
        if self.topology.total_weight() < self.threshold as u32 {
            tracing::warn!(
                threshold = self.threshold,
                weight = self.topology.total_weight(),
                "Signature weight is below the wallet threshold"
            );
        }

        let checkpoint = self.checkpoint.to_be_bytes();
        let skip = checkpoint.iter().take_while(|b| **b == 0).count();
        let checkpoint = &checkpoint[skip..];
        if checkpoint.len() > MAX_CHECKPOINT_BYTES {
            return Err(SignatureError::CheckpointTooLarge(self.checkpoint));
        }

        let wide_threshold = self.threshold > u8::MAX as u16;
        let mut flag = (checkpoint.len() as u8) << 2;
        if wide_threshold {
            flag |= 0x20;
        }

        let mut out = vec![flag];
        out.extend_from_slice(checkpoint);
        if wide_threshold {
            out.extend_from_slice(&self.threshold.to_be_bytes());
        } else {
            out.push(self.threshold as u8);
        }

        for leaf in &self.topology.leaves {
            let prefix = leaf.scheme.leaf_flag() << 4;
            if (1..=15).contains(&leaf.weight) {
                out.push(prefix | leaf.weight);
            } else {
                out.push(prefix);
                out.push(leaf.weight);
            }
            out.extend_from_slice(leaf.share.r.as_slice());
            out.extend_from_slice(&leaf.share.packed_s()?);
        }

        Ok(out.into())
    }

    /// Decode bytes produced by [`WalletSignature::encode`].
    ///
    /// Leaf addresses are not part of the encoding and decode as zero.
    pub fn decode(bytes: &[u8]) -> Result<Self, SignatureError> {
        let mut reader = Reader { bytes, pos: 0 };

        let flag = reader.take(1)?[0];
        let checkpoint_len = ((flag >> 2) & 0x07) as usize;
        let checkpoint = reader
            .take(checkpoint_len)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | *b as u64);
        let threshold = if flag & 0x20 != 0 {
            let t = reader.take(2)?;
            u16::from_be_bytes([t[0], t[1]])
        } else {
            reader.take(1)?[0] as u16
        };

        let mut leaves = Vec::new();
        while !reader.is_empty() {
            let first = reader.take(1)?[0];
            let scheme = SignatureScheme::from_leaf_flag(first >> 4)
                .ok_or(SignatureError::UnsupportedLeaf(first >> 4))?;
            let weight = match first & 0x0f {
                0 => reader.take(1)?[0],
                w => w,
            };
            let r = B256::from_slice(reader.take(32)?);
            let mut s = B256::from_slice(reader.take(32)?);
            let y_parity = s.0[0] >> 7;
            s.0[0] &= 0x7f;

            leaves.push(SignedLeaf {
                address: Address::ZERO,
                weight,
                scheme,
                share: SignatureShare { r, s, y_parity },
            });
        }

        if leaves.is_empty() {
            return Err(SignatureError::EmptyTopology);
        }

        Ok(Self {
            threshold,
            checkpoint,
            topology: SignerTopology { leaves },
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SignatureError> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(SignatureError::Truncated(self.bytes.len()));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}
