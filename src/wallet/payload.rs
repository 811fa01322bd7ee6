//! Canonical call payloads.
//!
//! A payload has two canonical forms that must agree with what the wallet
//! contract computes on-chain:
//! - the packed byte form passed as `execute(_payload, ..)`
//! - the EIP-712 struct form whose signing hash the user signs
//!
//! Both are pure functions of `(wallet, calls, nonce)`.
//!
//! # Packed layout
//! ```text
//! global flag (1)
//!   bit 0    space is zero (space omitted)
//!   bits 1-3 nonce byte length (0..=7)
//!   bit 4    single call (count omitted)
//!   bit 5    call count is 2 bytes
//! [space (20)] [nonce (n)] [count (1|2)]
//! per call:
//!   flag (1)
//!     bit 0  call targets the wallet itself (address omitted)
//!     bit 1  value present (32)
//!     bit 2  data present (3-byte length + bytes)
//!     bit 3  gas limit present (32)
//!     bit 4  delegate call
//!     bit 5  only fallback
//!     bits 6-7 behavior on error
//!   [to (20)] [value (32)] [len (3) data] [gas limit (32)]
//! ```

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use thiserror::Error;

use crate::wallet::abi;
use crate::wallet::nonce::EncodedNonce;

const MAX_NONCE_BYTES: usize = 7;
const MAX_DATA_LEN: usize = (1 << 24) - 1;
const MAX_CALLS: usize = u16::MAX as usize;

/// Payload construction and encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload must contain at least one call")]
    EmptyCalls,

    #[error("nonce sequence {0} does not fit in 7 bytes")]
    NonceTooLarge(U256),

    #[error("call data of {0} bytes exceeds the 3-byte length prefix")]
    DataTooLarge(usize),

    #[error("{0} calls exceed the 2-byte call count")]
    TooManyCalls(usize),
}

/// What the wallet does when a call reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BehaviorOnError {
    /// Skip the failed call and continue.
    Ignore = 0,
    /// Revert the whole batch.
    Revert = 1,
    /// Stop executing but keep earlier effects.
    Abort = 2,
}

/// A call in its canonical wallet form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
    pub delegate_call: bool,
    pub only_fallback: bool,
    pub behavior_on_error: BehaviorOnError,
}

impl Call {
    fn to_sol(&self) -> abi::Call {
        abi::Call {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            gasLimit: self.gas_limit,
            delegateCall: self.delegate_call,
            onlyFallback: self.only_fallback,
            behaviorOnError: U256::from(self.behavior_on_error as u8),
        }
    }
}

/// An ordered, non-empty list of calls executed under one nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallsPayload {
    calls: Vec<Call>,
    nonce: EncodedNonce,
}

impl CallsPayload {
    pub fn new(calls: Vec<Call>, nonce: EncodedNonce) -> Result<Self, PayloadError> {
        if calls.is_empty() {
            return Err(PayloadError::EmptyCalls);
        }
        if calls.len() > MAX_CALLS {
            return Err(PayloadError::TooManyCalls(calls.len()));
        }
        Ok(Self { calls, nonce })
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn nonce(&self) -> EncodedNonce {
        self.nonce
    }

    /// EIP-712 signing hash under the wallet's domain on `chain_id`.
    pub fn hash(&self, wallet: Address, chain_id: u64) -> B256 {
        let domain = Eip712Domain::new(
            Some(abi::DOMAIN_NAME.into()),
            Some(abi::DOMAIN_VERSION.into()),
            Some(U256::from(chain_id)),
            Some(wallet),
            None,
        );
        self.to_sol().eip712_signing_hash(&domain)
    }

    fn to_sol(&self) -> abi::Calls {
        abi::Calls {
            calls: self.calls.iter().map(Call::to_sol).collect(),
            space: self.nonce.space(),
            nonce: self.nonce.sequence(),
            wallets: Vec::new(),
        }
    }

    /// Packed byte form consumed by the wallet's `execute`.
    pub fn encode_packed(&self, wallet: Address) -> Result<Bytes, PayloadError> {
        let space = self.nonce.space();
        let sequence = self.nonce.sequence();
        let nonce_bytes = trimmed_be_bytes(sequence);
        if nonce_bytes.len() > MAX_NONCE_BYTES {
            return Err(PayloadError::NonceTooLarge(sequence));
        }

        let mut flag = (nonce_bytes.len() as u8) << 1;
        if space.is_zero() {
            flag |= 0x01;
        }
        if self.calls.len() == 1 {
            flag |= 0x10;
        } else if self.calls.len() > u8::MAX as usize {
            flag |= 0x20;
        }

        let mut out = vec![flag];
        if !space.is_zero() {
            out.extend_from_slice(&space.to_be_bytes::<32>()[12..]);
        }
        out.extend_from_slice(&nonce_bytes);
        if self.calls.len() > u8::MAX as usize {
            out.extend_from_slice(&(self.calls.len() as u16).to_be_bytes());
        } else if self.calls.len() > 1 {
            out.push(self.calls.len() as u8);
        }

        for call in &self.calls {
            encode_call(&mut out, call, wallet)?;
        }

        Ok(out.into())
    }
}

fn encode_call(out: &mut Vec<u8>, call: &Call, wallet: Address) -> Result<(), PayloadError> {
    if call.data.len() > MAX_DATA_LEN {
        return Err(PayloadError::DataTooLarge(call.data.len()));
    }

    let to_self = call.to == wallet;
    let mut flag = (call.behavior_on_error as u8) << 6;
    if to_self {
        flag |= 0x01;
    }
    if !call.value.is_zero() {
        flag |= 0x02;
    }
    if !call.data.is_empty() {
        flag |= 0x04;
    }
    if !call.gas_limit.is_zero() {
        flag |= 0x08;
    }
    if call.delegate_call {
        flag |= 0x10;
    }
    if call.only_fallback {
        flag |= 0x20;
    }
    out.push(flag);

    if !to_self {
        out.extend_from_slice(call.to.as_slice());
    }
    if !call.value.is_zero() {
        out.extend_from_slice(&call.value.to_be_bytes::<32>());
    }
    if !call.data.is_empty() {
        out.extend_from_slice(&(call.data.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&call.data);
    }
    if !call.gas_limit.is_zero() {
        out.extend_from_slice(&call.gas_limit.to_be_bytes::<32>());
    }
    Ok(())
}

fn trimmed_be_bytes(value: U256) -> Vec<u8> {
    let bytes = value.to_be_bytes::<32>();
    let leading = bytes.iter().take_while(|b| **b == 0).count();
    bytes[leading..].to_vec()
}

/// Hash of `payload` as signed for `wallet` on `chain_id`.
pub fn payload_hash(wallet: Address, chain_id: u64, payload: &CallsPayload) -> B256 {
    payload.hash(wallet, chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, bytes};

    const WALLET: Address = address!("0x7d1b7c1f3a8a7b3c4f3b2d6e5c9a1b2c3d4e5f60");
    const TARGET: Address = address!("0x00000000000000000000000000000000000000aa");

    fn call() -> Call {
        Call {
            to: TARGET,
            value: U256::from(5u8),
            data: bytes!("deadbeef"),
            gas_limit: U256::ZERO,
            delegate_call: false,
            only_fallback: false,
            behavior_on_error: BehaviorOnError::Revert,
        }
    }

    fn payload(call: Call) -> CallsPayload {
        let nonce = EncodedNonce::new(U256::ZERO, U256::from(1u8)).unwrap();
        CallsPayload::new(vec![call], nonce).unwrap()
    }

    #[test]
    fn test_rejects_empty_payload() {
        let nonce = EncodedNonce::new(U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(CallsPayload::new(vec![], nonce), Err(PayloadError::EmptyCalls));
    }

    #[test]
    fn test_hash_is_pure() {
        let p = payload(call());
        assert_eq!(payload_hash(WALLET, 1, &p), payload_hash(WALLET, 1, &p.clone()));
    }

    #[test]
    fn test_hash_changes_with_every_input() {
        let base = payload_hash(WALLET, 1, &payload(call()));

        assert_ne!(base, payload_hash(TARGET, 1, &payload(call())));
        assert_ne!(base, payload_hash(WALLET, 2, &payload(call())));

        let mut other = call();
        other.to = WALLET;
        assert_ne!(base, payload_hash(WALLET, 1, &payload(other)));

        let mut other = call();
        other.value = U256::from(6u8);
        assert_ne!(base, payload_hash(WALLET, 1, &payload(other)));

        let mut other = call();
        other.data = bytes!("deadbeee");
        assert_ne!(base, payload_hash(WALLET, 1, &payload(other)));

        let mut other = call();
        other.gas_limit = U256::from(21_000u32);
        assert_ne!(base, payload_hash(WALLET, 1, &payload(other)));

        let mut other = call();
        other.delegate_call = true;
        assert_ne!(base, payload_hash(WALLET, 1, &payload(other)));

        let mut other = call();
        other.behavior_on_error = BehaviorOnError::Ignore;
        assert_ne!(base, payload_hash(WALLET, 1, &payload(other)));

        let nonce = EncodedNonce::new(U256::ZERO, U256::from(2u8)).unwrap();
        let bumped = CallsPayload::new(vec![call()], nonce).unwrap();
        assert_ne!(base, payload_hash(WALLET, 1, &bumped));
    }

    #[test]
    fn test_packed_single_call_layout() {
        let encoded = payload(call()).encode_packed(WALLET).unwrap();

        let mut expected = vec![0x01 | (1 << 1) | 0x10, 0x01];
        expected.push((1 << 6) | 0x02 | 0x04);
        expected.extend_from_slice(TARGET.as_slice());
        expected.extend_from_slice(&U256::from(5u8).to_be_bytes::<32>());
        expected.extend_from_slice(&[0x00, 0x00, 0x04, 0xde, 0xad, 0xbe, 0xef]);

        assert_eq!(encoded.to_vec(), expected);
    }

    #[test]
    fn test_packed_self_call_and_space() {
        let mut self_call = call();
        self_call.to = WALLET;
        self_call.value = U256::ZERO;
        self_call.data = Bytes::new();
        self_call.behavior_on_error = BehaviorOnError::Ignore;

        let nonce = EncodedNonce::new(U256::from(3u8), U256::ZERO).unwrap();
        let p = CallsPayload::new(vec![self_call.clone(), self_call], nonce).unwrap();
        let encoded = p.encode_packed(WALLET).unwrap();

        // no zero-space bit, empty nonce, two calls counted in one byte
        assert_eq!(encoded[0], 0x00);
        assert_eq!(encoded[20], 0x03);
        assert_eq!(encoded[21], 0x02);
        assert_eq!(&encoded[22..], &[0x01, 0x01]);
    }

    #[test]
    fn test_packed_rejects_oversized_nonce() {
        let sequence = U256::from(1u8) << 56usize;
        let nonce = EncodedNonce::new(U256::ZERO, sequence).unwrap();
        let p = CallsPayload::new(vec![call()], nonce).unwrap();
        assert_eq!(p.encode_packed(WALLET), Err(PayloadError::NonceTooLarge(sequence)));
    }
}
