//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Relayed transaction id:
//!     → retries.rs (poll at a fixed interval until terminal or exhausted)
//!     → transaction::confirmation (maps outcomes to hash or error)
//! ```
//!
//! # Design Decisions
//! - Every wait has a bound; a transaction that never settles is an error
//! - Relay and chain calls are not retried; only status polling loops

pub mod retries;

pub use retries::{retry_until_terminal, Attempt, RetryError, RetryPolicy};
