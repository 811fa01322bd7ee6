//! The send pipeline: build → sign → submit → poll.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tracing::Instrument;

use crate::blockchain::{ChainId, ChainRpc};
use crate::config::ConfirmationConfig;
use crate::observability::{metrics, Flow};
use crate::relay::{RelayClient, RelayerTransactionStatus};
use crate::resilience::RetryPolicy;
use crate::transaction::builder::{build_meta_transactions, read_nonce, NonceLocks, TransactionRequest};
use crate::transaction::confirmation::{wait_for_relayed, ConfirmationError};
use crate::transaction::signing::sign_meta_transactions;
use crate::transaction::TransactionError;
use crate::wallet::signer::DigestSigner;

impl From<&ConfirmationConfig> for RetryPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        RetryPolicy::new(
            Duration::from_millis(config.poll_interval_ms),
            config.max_attempts,
        )
    }
}

/// Everything needed to take a request to an on-chain hash.
pub struct TransactionPipeline {
    chain: Arc<dyn ChainRpc>,
    relay: Arc<RelayClient>,
    signer: Arc<dyn DigestSigner>,
    locks: NonceLocks,
    chain_id: ChainId,
    space: U256,
    policy: RetryPolicy,
}

impl TransactionPipeline {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        relay: Arc<RelayClient>,
        signer: Arc<dyn DigestSigner>,
        chain_id: ChainId,
        space: U256,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            relay,
            signer,
            locks: NonceLocks::new(),
            chain_id,
            space,
            policy,
        }
    }

    pub fn space(&self) -> U256 {
        self.space
    }

    /// Send `request` from `wallet`; returns the on-chain transaction hash.
    pub async fn send(
        &self,
        wallet: Address,
        request: &TransactionRequest,
        flow: &Flow,
    ) -> Result<String, TransactionError> {
        let result = self
            .run(wallet, request, flow)
            .instrument(flow.span().clone())
            .await;

        metrics::record_transaction(outcome_label(&result));
        match &result {
            Ok(hash) => tracing::info!(flow_id = %flow.id(), %wallet, hash = %hash, "Transaction confirmed"),
            Err(e) => tracing::warn!(flow_id = %flow.id(), %wallet, error = %e, "Transaction failed"),
        }
        result
    }

    async fn run(
        &self,
        wallet: Address,
        request: &TransactionRequest,
        flow: &Flow,
    ) -> Result<String, TransactionError> {
        let _guard = self.locks.acquire(wallet, self.space).await;

        tracing::info!(stage = "build", %wallet, "Building meta-transactions");
        let read = read_nonce(self.chain.as_ref(), wallet, self.space).await?;
        flow.add_event("nonceRead");
        if !read.deployed {
            flow.add_event("walletUndeployed");
        }
        let metas = build_meta_transactions(request, read.nonce)?;
        flow.add_event("metaTransactionsBuilt");

        tracing::info!(stage = "sign", nonce = %read.nonce.pack(), "Signing meta-transactions");
        let calldata =
            sign_meta_transactions(&metas, self.chain_id, wallet, self.signer.as_ref()).await?;
        flow.add_event("metaTransactionsSigned");

        let relay_id = self
            .relay
            .eth_send_transaction(wallet, &calldata, self.chain_id)
            .await?;
        tracing::info!(stage = "submitted", relay_id = %relay_id, "Submitted to relay");
        flow.add_event("submitted");

        tracing::info!(
            stage = "polling",
            relay_id = %relay_id,
            interval_ms = self.policy.interval.as_millis() as u64,
            max_attempts = self.policy.max_attempts,
            "Waiting for confirmation"
        );
        let hash = wait_for_relayed(&self.relay, &relay_id, self.policy).await?;
        tracing::info!(stage = "successful", relay_id = %relay_id, hash = %hash, "Relay reported success");
        flow.add_event("confirmed");

        Ok(hash)
    }
}

fn outcome_label(result: &Result<String, TransactionError>) -> &'static str {
    match result {
        Ok(_) => "successful",
        Err(TransactionError::Confirmation(ConfirmationError::Terminal { status, .. })) => {
            match status {
                RelayerTransactionStatus::Reverted => "reverted",
                RelayerTransactionStatus::Cancelled => "cancelled",
                _ => "failed",
            }
        }
        Err(TransactionError::Confirmation(ConfirmationError::Timeout { .. })) => "timeout",
        Err(_) => "error",
    }
}
