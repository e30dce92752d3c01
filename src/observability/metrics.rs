//! Metrics collection and exposition.
//!
//! # Metrics
//! - `queue_attempts_total` (counter): attempts by queue and outcome
//! - `queue_calls_exhausted_total` (counter): calls that ran out of retries
//! - `queue_failure_count` (gauge): current shared failure counter
//! - `queue_active_calls` (gauge): attempts currently running
//! - `queue_call_duration_seconds` (histogram): submission to success
//! - `proxy_requests_total` (counter): inbound requests by route and status
//! - `proxy_request_duration_seconds` (histogram): inbound latency by route
//!
//! Without an installed recorder every call here is a no-op, which keeps
//! tests free of exporter setup.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_attempt(queue: &'static str, outcome: &'static str) {
    metrics::counter!("queue_attempts_total", "queue" => queue, "outcome" => outcome).increment(1);
}

pub fn record_exhausted(queue: &'static str) {
    metrics::counter!("queue_calls_exhausted_total", "queue" => queue).increment(1);
}

pub fn record_failure_count(queue: &'static str, failure_count: u32) {
    metrics::gauge!("queue_failure_count", "queue" => queue).set(failure_count as f64);
}

pub fn record_active_calls(queue: &'static str, active: usize) {
    metrics::gauge!("queue_active_calls", "queue" => queue).set(active as f64);
}

pub fn record_call_duration(queue: &'static str, elapsed: Duration) {
    metrics::histogram!("queue_call_duration_seconds", "queue" => queue)
        .record(elapsed.as_secs_f64());
}

/// Record a finished inbound request.
pub fn record_request(route: &'static str, status: u16, start_time: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "route" => route)
        .record(start_time.elapsed().as_secs_f64());
}
