//! Confirmation polling for relayed transactions.
//!
//! ```text
//! SUCCESSFUL                  → hash (missing hash is a relay error)
//! FAILED | REVERTED | CANCELLED → ConfirmationError::Terminal
//! anything else               → poll again after the interval
//! relay error                 → ConfirmationError::Relay (not retried)
//! budget spent                → ConfirmationError::Timeout
//! ```

use std::future::Future;

use thiserror::Error;

use crate::observability::metrics;
use crate::relay::{RelayClient, RelayError, RelayerTransaction, RelayerTransactionStatus};
use crate::resilience::{retry_until_terminal, Attempt, RetryError, RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Transaction {}: {message}", .status.as_str())]
    Terminal {
        status: RelayerTransactionStatus,
        message: String,
    },

    #[error("Transaction not confirmed after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error(transparent)]
    Relay(#[from] RelayError),
}

fn classify(tx: RelayerTransaction) -> Attempt<String, ConfirmationError> {
    metrics::record_poll(tx.status.as_str());
    match tx.status {
        RelayerTransactionStatus::Successful if tx.hash.is_empty() => Attempt::Fail(
            ConfirmationError::Relay(RelayError::UnexpectedResult(
                "successful transaction has no hash".to_string(),
            )),
        ),
        RelayerTransactionStatus::Successful => Attempt::Done(tx.hash),
        RelayerTransactionStatus::Failed
        | RelayerTransactionStatus::Reverted
        | RelayerTransactionStatus::Cancelled => {
            let message = tx
                .status_message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "transaction was not executed".to_string());
            Attempt::Fail(ConfirmationError::Terminal {
                status: tx.status,
                message,
            })
        }
        status => {
            tracing::trace!(status = status.as_str(), "Transaction not final");
            Attempt::Retry
        }
    }
}

/// Poll with `poll` until the transaction is final or the budget is spent.
pub async fn wait_for_transaction<F, Fut>(
    policy: RetryPolicy,
    mut poll: F,
) -> Result<String, ConfirmationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RelayerTransaction, RelayError>>,
{
    let result = retry_until_terminal(policy, |_| {
        let status = poll();
        async move {
            match status.await {
                Ok(tx) => classify(tx),
                Err(e) => Attempt::Fail(ConfirmationError::Relay(e)),
            }
        }
    })
    .await;

    match result {
        Ok(hash) => Ok(hash),
        Err(RetryError::Failed(e)) => Err(e),
        Err(RetryError::Exhausted { attempts }) => Err(ConfirmationError::Timeout { attempts }),
    }
}

/// Wait for the relay transaction `relay_id` to settle.
pub async fn wait_for_relayed(
    relay: &RelayClient,
    relay_id: &str,
    policy: RetryPolicy,
) -> Result<String, ConfirmationError> {
    wait_for_transaction(policy, || relay.im_get_transaction_by_hash(relay_id)).await
}
