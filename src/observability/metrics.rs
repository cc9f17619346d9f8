//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_http_requests_total` (counter): API requests by service, status
//! - `gateway_http_request_duration_seconds` (histogram): API latency
//! - `gateway_ws_sessions` (gauge): currently registered WebSocket sessions
//! - `gateway_ws_frames_total` (counter): inbound frames by outcome
//! - `gateway_pool_dials_total` (counter): backend dials by service, result
//! - `gateway_pool_evictions_total` (counter): pool removals by service, reason
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    if let Err(e) = builder.install() {
        tracing::error!(error = %e, "Failed to install Prometheus metrics exporter");
        return;
    }

    tracing::info!(address = %addr, "Metrics exporter listening");
}

/// Record an API request's outcome and latency.
pub fn record_http_request(service: &str, status: u16, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    let status = status.to_string();

    counter!(
        "gateway_http_requests_total",
        "service" => service.to_string(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "gateway_http_request_duration_seconds",
        "service" => service.to_string(),
        "status" => status
    )
    .record(duration);
}

pub fn set_ws_sessions(count: usize) {
    gauge!("gateway_ws_sessions").set(count as f64);
}

/// `outcome`: "ok", "rejected", "failed".
pub fn record_ws_frame(outcome: &'static str) {
    counter!("gateway_ws_frames_total", "outcome" => outcome).increment(1);
}

pub fn record_pool_dial(service: &str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!(
        "gateway_pool_dials_total",
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);
}

/// `reason`: "stale", "idle", "capacity".
pub fn record_pool_eviction(service: &str, reason: &'static str) {
    counter!(
        "gateway_pool_evictions_total",
        "service" => service.to_string(),
        "reason" => reason
    )
    .increment(1);
}
