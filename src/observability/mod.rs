//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → flow.rs (per-operation spans with correlation IDs)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Flow ID flows through every step of a transaction
//! - Secrets (keys, access tokens) never reach a log line

pub mod flow;
pub mod logging;
pub mod metrics;

pub use flow::Flow;
pub use logging::init_logging;
