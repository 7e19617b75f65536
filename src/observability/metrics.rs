//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency by route
//! - `gateway_rate_limited_total` (counter): 429s by route
//! - `gateway_cache_lookups_total` (counter): cache lookups by route, result

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, started_at: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(started_at.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    ::metrics::counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_cache_lookup(route: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    ::metrics::counter!(
        "gateway_cache_lookups_total",
        "route" => route.to_string(),
        "result" => result
    )
    .increment(1);
}
