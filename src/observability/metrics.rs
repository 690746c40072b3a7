//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_calls_total` (counter): logical calls by service, result
//! - `lb_attempts_total` (counter): attempts by service, outcome
//! - `lb_attempt_duration_seconds` (histogram): attempt latency by service
//! - `lb_short_circuit_total` (counter): backends tripped, by service
//! - `lb_backends` (gauge): registered backends by service

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(service: &str, result: &'static str) {
    counter!("lb_calls_total", "service" => service.to_string(), "result" => result).increment(1);
}

pub fn record_attempt(service: &str, outcome: &'static str, elapsed: Duration) {
    counter!("lb_attempts_total", "service" => service.to_string(), "outcome" => outcome).increment(1);
    histogram!("lb_attempt_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_short_circuit(service: &str) {
    counter!("lb_short_circuit_total", "service" => service.to_string()).increment(1);
}

pub fn record_backends(service: &str, count: usize) {
    gauge!("lb_backends", "service" => service.to_string()).set(count as f64);
}
