//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): completed requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_response_bytes` (histogram): emitted body size
//! - `gateway_proxy_total` (counter): proxied calls by target kind, outcome
//! - `deployment_sync_total` (counter): sync runs by outcome
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::log_sink::RequestRecord;

/// Install the Prometheus exporter. Failure is logged, never fatal.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(record: &RequestRecord) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => record.method.clone(),
        "status" => record.status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(record.duration_ms / 1000.0);
    metrics::histogram!("gateway_response_bytes").record(record.size as f64);
}

pub fn record_proxy(target: &'static str, outcome: &'static str) {
    metrics::counter!("gateway_proxy_total", "target" => target, "outcome" => outcome).increment(1);
}

pub fn record_sync(outcome: &'static str) {
    metrics::counter!("deployment_sync_total", "outcome" => outcome).increment(1);
}
