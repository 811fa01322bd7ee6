//! Meta-transaction signing.
//!
//! Produces the calldata of `execute(_payload, _signature)` for the wallet:
//! canonical calls → payload → digest → signature share → one-leaf wallet
//! signature → ABI encoding.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;

use crate::blockchain::ChainId;
use crate::transaction::builder::MetaTransaction;
use crate::transaction::TransactionError;
use crate::wallet::abi::IWallet;
use crate::wallet::payload::{BehaviorOnError, Call, CallsPayload, PayloadError};
use crate::wallet::signature::{SignatureShare, SignedLeaf, SignerTopology, WalletSignature};
use crate::wallet::signer::DigestSigner;

const SIGNER_WEIGHT: u8 = 1;
const WALLET_THRESHOLD: u16 = 1;

fn to_call(meta: &MetaTransaction) -> Call {
    Call {
        to: meta.to,
        value: meta.value,
        data: meta.data.clone(),
        gas_limit: meta.gas_limit.unwrap_or_default(),
        delegate_call: meta.delegate_call,
        only_fallback: false,
        behavior_on_error: if meta.revert_on_error {
            BehaviorOnError::Revert
        } else {
            BehaviorOnError::Ignore
        },
    }
}

/// Build the payload the wallet will execute for `metas`.
pub fn build_payload(metas: &[MetaTransaction]) -> Result<CallsPayload, TransactionError> {
    let first = metas.first().ok_or(PayloadError::EmptyCalls)?;
    if metas.iter().any(|m| m.nonce != first.nonce) {
        return Err(TransactionError::InvalidRequest(
            "meta-transactions must share one nonce".into(),
        ));
    }
    Ok(CallsPayload::new(metas.iter().map(to_call).collect(), first.nonce)?)
}

/// Sign `metas` for `wallet` on `chain_id`; returns `execute` calldata.
pub async fn sign_meta_transactions(
    metas: &[MetaTransaction],
    chain_id: ChainId,
    wallet: Address,
    signer: &dyn DigestSigner,
) -> Result<Bytes, TransactionError> {
    let payload = build_payload(metas)?;
    let packed = payload.encode_packed(wallet)?;
    let digest = payload.hash(wallet, chain_id.0);

    let raw = signer.sign_digest(digest).await?;
    let share = SignatureShare::from_raw(&raw)?;
    let leaf = SignedLeaf {
        address: signer.address().await?,
        weight: SIGNER_WEIGHT,
        scheme: signer.scheme(),
        share,
    };
    let signature = WalletSignature {
        threshold: WALLET_THRESHOLD,
        checkpoint: 0,
        topology: SignerTopology::single(leaf),
    }
    .encode()?;

    tracing::debug!(
        %wallet,
        %digest,
        payload_len = packed.len(),
        signature_len = signature.len(),
        "Signed meta-transactions"
    );

    let calldata = IWallet::executeCall {
        _payload: packed,
        _signature: signature,
    }
    .abi_encode();
    Ok(calldata.into())
}
