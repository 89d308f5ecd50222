//! Metrics collection and exposition.
//!
//! # Metrics
//! - `kubeconfig_proxy_requests_total` (counter): requests by route, status
//! - `kubeconfig_proxy_request_duration_seconds` (histogram): time to response headers
//! - `kubeconfig_proxy_reloads_total` (counter): route table reloads by result
//! - `kubeconfig_proxy_routes` (gauge): routes in the current table
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve Prometheus metrics on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "kubeconfig_proxy_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("kubeconfig_proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("kubeconfig_proxy_reloads_total", "result" => result).increment(1);
}

pub fn set_route_count(count: usize) {
    metrics::gauge!("kubeconfig_proxy_routes").set(count as f64);
}
