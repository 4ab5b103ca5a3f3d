//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by method, status, backend
//! - `lb_request_duration_seconds` (histogram): time to response head
//! - `lb_forward_failures_total` (counter): candidate forward failures by backend
//! - `lb_body_failures_total` (counter): response bodies cut short by backend
//! - `lb_pool_exhausted_total` (counter): requests answered with 503
//! - `lb_backend_healthy` (gauge): 1=healthy, 0=unhealthy

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("backend", backend.to_string()),
    ];
    counter!("lb_requests_total", labels.clone()).increment(1);
    histogram!("lb_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

pub fn record_forward_failure(backend: &str) {
    counter!("lb_forward_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_body_failure(backend: &str) {
    counter!("lb_body_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_pool_exhausted() {
    counter!("lb_pool_exhausted_total").increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("lb_backend_healthy", "backend" => backend.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
