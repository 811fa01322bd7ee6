//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_relay_requests_total` (counter): relay JSON-RPC calls by method, outcome
//! - `wallet_relay_request_duration_seconds` (histogram): relay call latency by method
//! - `wallet_relay_polls_total` (counter): confirmation polls by observed status
//! - `wallet_relay_transactions_total` (counter): sent transactions by final outcome
//! - `wallet_relay_signatures_total` (counter): signatures produced by signer kind
//! - `wallet_relay_provider_requests_total` (counter): façade calls by method, outcome

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_relay_request(method: &'static str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("wallet_relay_requests_total", "method" => method, "outcome" => outcome).increment(1);
    histogram!("wallet_relay_request_duration_seconds", "method" => method)
        .record(elapsed.as_secs_f64());
}

pub fn record_poll(status: &'static str) {
    counter!("wallet_relay_polls_total", "status" => status).increment(1);
}

pub fn record_transaction(outcome: &'static str) {
    counter!("wallet_relay_transactions_total", "outcome" => outcome).increment(1);
}

pub fn record_signature(kind: &'static str) {
    counter!("wallet_relay_signatures_total", "kind" => kind).increment(1);
}

pub fn record_provider_request(method: String, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("wallet_relay_provider_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
}
