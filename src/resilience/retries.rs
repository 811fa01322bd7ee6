//! Bounded polling.
//!
//! # Responsibilities
//! - Run an attempt until it reports a terminal outcome
//! - Wait a fixed interval between attempts, never after the last one
//! - Give up after a fixed number of attempts
//!
//! # Design Decisions
//! - Fixed interval, no jitter: one caller polls one resource
//! - Errors from an attempt are terminal; only `Attempt::Retry` loops

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Terminal success.
    Done(T),
    /// Terminal failure, returned as-is.
    Fail(E),
    /// Not there yet; try again after the interval.
    Retry,
}

/// How often and how many times to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Failed(E),
}

/// Call `attempt` until it returns `Done` or `Fail`, or `policy.max_attempts`
/// calls have all returned `Retry`.
pub async fn retry_until_terminal<T, E, F, Fut>(
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fail(err) => return Err(RetryError::Failed(err)),
            Attempt::Retry => {
                tracing::trace!(attempt = n, max = policy.max_attempts, "Not terminal yet");
                if n < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
    })
}
