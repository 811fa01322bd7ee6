//! Flow tracking.
//!
//! A flow is one user-visible operation (`eth_sendTransaction`,
//! `eth_requestAccounts`). Each carries a UUID v4 correlation id; events are
//! emitted as tracing events with the time elapsed since the flow started.

use std::time::Instant;

use tracing::Span;
use uuid::Uuid;

/// A tracked user operation.
#[derive(Debug)]
pub struct Flow {
    id: Uuid,
    name: &'static str,
    started: Instant,
    span: Span,
}

impl Flow {
    pub fn start(name: &'static str) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("flow", flow_id = %id, flow = name, user = tracing::field::Empty);
        span.in_scope(|| tracing::debug!("Flow started"));
        Self {
            id,
            name,
            started: Instant::now(),
            span,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Span to instrument the flow's futures with.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record a named milestone.
    pub fn add_event(&self, event: &'static str) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.span
            .in_scope(|| tracing::info!(event, elapsed_ms, "Flow event"));
    }

    /// Attach the user subject to this flow.
    pub fn identify(&self, sub: &str) {
        self.span.record("user", sub);
        self.span.in_scope(|| tracing::info!(user = sub, "Flow identified"));
    }
}
