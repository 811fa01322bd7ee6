//! Nonce reads and meta-transaction construction.
//!
//! # Responsibilities
//! - Read the wallet's next nonce for a space (deployed or not)
//! - Turn an `eth_sendTransaction` request into meta-transactions
//! - Serialize sends per `(wallet, space)` so two sends never share a nonce

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::blockchain::{ChainError, ChainRpc};
use crate::transaction::TransactionError;
use crate::wallet::abi::IWallet;
use crate::wallet::nonce::EncodedNonce;

/// First usable sequence of an undeployed wallet. Sequence 0 is consumed by
/// the deployment that the relay bundles with the first transaction.
pub const UNDEPLOYED_SEQUENCE: u64 = 1;

/// A transaction request object as passed to `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default, alias = "input")]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub value: Option<U256>,
    /// Outer-transaction gas estimate. Logged only; the relay sponsors gas
    /// and the inner call runs without a gas limit.
    #[serde(default, alias = "gasLimit")]
    pub gas: Option<U256>,
}

/// One intended on-chain call, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: EncodedNonce,
    pub gas_limit: Option<U256>,
    pub delegate_call: bool,
    pub revert_on_error: bool,
}

/// Result of a nonce read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRead {
    pub nonce: EncodedNonce,
    /// Whether the wallet contract has code on chain.
    pub deployed: bool,
}

/// Read the next nonce of `wallet` in `space`, noting whether it is deployed.
pub async fn read_nonce(
    chain: &dyn ChainRpc,
    wallet: Address,
    space: U256,
) -> Result<NonceRead, TransactionError> {
    let code = chain.get_code(wallet).await?;
    if code.is_empty() {
        tracing::debug!(%wallet, %space, "Wallet not deployed");
        let nonce = EncodedNonce::new(space, U256::from(UNDEPLOYED_SEQUENCE))?;
        return Ok(NonceRead {
            nonce,
            deployed: false,
        });
    }

    let calldata = IWallet::readNonceCall { _space: space }.abi_encode();
    let returned = chain.call(wallet, calldata.into()).await?;
    if returned.len() < 32 {
        return Err(ChainError::Decode(format!(
            "readNonce returned {} bytes",
            returned.len()
        ))
        .into());
    }
    let sequence = U256::from_be_slice(&returned[..32]);
    tracing::debug!(%wallet, %space, %sequence, "Read wallet nonce");

    Ok(NonceRead {
        nonce: EncodedNonce::new(space, sequence)?,
        deployed: true,
    })
}

/// Next nonce of `wallet` in `space`.
pub async fn get_nonce(
    chain: &dyn ChainRpc,
    wallet: Address,
    space: U256,
) -> Result<EncodedNonce, TransactionError> {
    Ok(read_nonce(chain, wallet, space).await?.nonce)
}

/// Build the meta-transactions for a single request.
pub fn build_meta_transactions(
    request: &TransactionRequest,
    nonce: EncodedNonce,
) -> Result<Vec<MetaTransaction>, TransactionError> {
    let to = request
        .to
        .ok_or_else(|| TransactionError::InvalidRequest("transaction has no 'to' address".into()))?;
    if let Some(gas) = request.gas {
        tracing::debug!(%to, %gas, "Ignoring caller gas limit");
    }

    Ok(vec![MetaTransaction {
        to,
        data: request.data.clone().unwrap_or_default(),
        value: request.value.unwrap_or_default(),
        nonce,
        gas_limit: None,
        delegate_call: false,
        revert_on_error: true,
    }])
}

/// Per-`(wallet, space)` send locks.
///
/// A guard is held from the nonce read until the transaction is confirmed or
/// has failed. Entries are dropped once no sender holds or waits on them.
#[derive(Debug, Default)]
pub struct NonceLocks {
    locks: Arc<DashMap<(Address, U256), Arc<Mutex<()>>>>,
}

/// Exclusive hold on one `(wallet, space)` pair.
#[derive(Debug)]
pub struct NonceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: (Address, U256),
    locks: Arc<DashMap<(Address, U256), Arc<Mutex<()>>>>,
}

impl Drop for NonceGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold their own clone of the mutex, so the map's copy is
        // the only one left exactly when nobody is queued.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl NonceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, wallet: Address, space: U256) -> NonceGuard {
        let key = (wallet, space);
        let lock = self.locks.entry(key).or_default().clone();
        NonceGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: self.locks.clone(),
        }
    }

    /// Number of `(wallet, space)` pairs currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ChainResult;
    use alloy::primitives::address;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const WALLET: Address = address!("0x1111111111111111111111111111111111111111");

    struct FakeChain {
        code: Bytes,
        onchain_nonce: U256,
        calls: AtomicUsize,
    }

    impl FakeChain {
        fn undeployed() -> Self {
            Self {
                code: Bytes::new(),
                onchain_nonce: U256::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn deployed(nonce: u64) -> Self {
            Self {
                code: Bytes::from_static(&[0x60, 0x80]),
                onchain_nonce: U256::from(nonce),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainRpc for FakeChain {
        async fn get_code(&self, _address: Address) -> ChainResult<Bytes> {
            Ok(self.code.clone())
        }

        async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(to, WALLET);
            assert_eq!(&data[..4], &IWallet::readNonceCall::SELECTOR);
            Ok(Bytes::from(self.onchain_nonce.to_be_bytes::<32>().to_vec()))
        }

        async fn request(&self, _method: &str, _params: Value) -> ChainResult<Value> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_undeployed_wallet_starts_at_one() {
        let chain = FakeChain::undeployed();
        for space in [U256::ZERO, U256::from(7u8), U256::from(1u8) << 150usize] {
            let read = read_nonce(&chain, WALLET, space).await.unwrap();
            assert!(!read.deployed);
            assert_eq!(read.nonce.space(), space);
            assert_eq!(read.nonce.sequence(), U256::from(1u8));
        }
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deployed_wallet_reads_contract() {
        let chain = FakeChain::deployed(42);
        let nonce = get_nonce(&chain, WALLET, U256::from(3u8)).await.unwrap();
        assert_eq!(nonce.space(), U256::from(3u8));
        assert_eq!(nonce.sequence(), U256::from(42u8));
        assert_eq!(chain.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_space_out_of_range() {
        let chain = FakeChain::undeployed();
        let err = get_nonce(&chain, WALLET, U256::from(1u8) << 160usize)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::Nonce(_)));
    }

    #[test]
    fn test_request_parsing() {
        let request: TransactionRequest = serde_json::from_value(json!({
            "to": "0x2222222222222222222222222222222222222222",
            "value": "0x10",
            "data": "0xdeadbeef"
        }))
        .unwrap();
        assert_eq!(request.value, Some(U256::from(16u8)));
        assert_eq!(request.data.clone().unwrap().to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);

        let nonce = EncodedNonce::new(U256::ZERO, U256::from(1u8)).unwrap();
        let metas = build_meta_transactions(&request, nonce).unwrap();
        assert_eq!(metas.len(), 1);
        assert!(metas[0].revert_on_error);
        assert!(!metas[0].delegate_call);
        assert_eq!(metas[0].nonce, nonce);
    }

    #[test]
    fn test_caller_gas_not_forwarded() {
        let request: TransactionRequest = serde_json::from_value(json!({
            "to": "0x2222222222222222222222222222222222222222",
            "gas": "0x5208"
        }))
        .unwrap();
        assert_eq!(request.gas, Some(U256::from(21000u32)));

        let nonce = EncodedNonce::new(U256::ZERO, U256::from(1u8)).unwrap();
        let metas = build_meta_transactions(&request, nonce).unwrap();
        assert_eq!(metas[0].gas_limit, None);
    }

    #[test]
    fn test_missing_to_is_invalid() {
        let nonce = EncodedNonce::new(U256::ZERO, U256::from(1u8)).unwrap();
        let err = build_meta_transactions(&TransactionRequest::default(), nonce).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_nonce_locks_serialize_same_key() {
        let locks = Arc::new(NonceLocks::new());
        let guard = locks.acquire(WALLET, U256::ZERO).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(WALLET, U256::ZERO).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different space is independent
        let _other = locks.acquire(WALLET, U256::from(1u8)).await;
        assert_eq!(locks.len(), 2);

        drop(guard);
        contender.await.unwrap();
        drop(_other);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_nonce_lock_kept_while_awaited() {
        let locks = Arc::new(NonceLocks::new());
        let guard = locks.acquire(WALLET, U256::ZERO).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(WALLET, U256::ZERO).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);

        let second = contender.await.unwrap();
        assert_eq!(locks.len(), 1);
        drop(second);
        assert!(locks.is_empty());
    }
}
