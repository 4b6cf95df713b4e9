//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by method, status
//! - `gate_request_duration_seconds` (histogram): latency distribution
//! - `gate_rejections_total` (counter): rejections by error code
//! - `gate_rate_limited_total` (counter): requests denied by the limiter
//! - `gate_buckets_active` (gauge): tracked client buckets
//! - `gate_reaper_evictions_total` (counter): buckets evicted as idle
//! - `gate_store_calls_total` (counter): identity store calls by operation, outcome
//! - `gate_store_call_duration_seconds` (histogram): identity store latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!("gate_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    histogram!("gate_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(code: &'static str) {
    counter!("gate_rejections_total", "code" => code).increment(1);
}

pub fn record_rate_limited() {
    counter!("gate_rate_limited_total").increment(1);
}

pub fn record_reaper_sweep(evicted: usize, remaining: usize) {
    counter!("gate_reaper_evictions_total").increment(evicted as u64);
    gauge!("gate_buckets_active").set(remaining as f64);
}

pub fn record_store_call(operation: &'static str, outcome: &'static str, start: Instant) {
    counter!("gate_store_calls_total", "operation" => operation, "outcome" => outcome).increment(1);
    histogram!("gate_store_call_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
