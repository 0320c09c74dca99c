//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by prefix, status
//! - `gateway_request_duration_seconds` (histogram): time to response headers
//! - `gateway_registrations_total` (counter): registrations, by whether a handler was evicted
//! - `gateway_proxy_builds_total` (counter): handler constructions by prefix
//! - `gateway_endpoint_rewrites_total` (counter): rewritten endpoint announcements
//! - `gateway_active_streams` (gauge): event streams currently being relayed
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside the runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(prefix: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "prefix" => prefix.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "prefix" => prefix.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_registration(evicted: bool) {
    ::metrics::counter!(
        "gateway_registrations_total",
        "evicted" => if evicted { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_proxy_build(prefix: &str) {
    ::metrics::counter!("gateway_proxy_builds_total", "prefix" => prefix.to_string()).increment(1);
}

pub fn record_endpoint_rewrites(prefix: &str, count: u64) {
    if count > 0 {
        ::metrics::counter!("gateway_endpoint_rewrites_total", "prefix" => prefix.to_string())
            .increment(count);
    }
}

/// Holds `gateway_active_streams` up for as long as a stream body lives.
#[derive(Debug)]
pub struct StreamGuard {
    prefix: String,
}

impl StreamGuard {
    pub fn new(prefix: &str) -> Self {
        ::metrics::gauge!("gateway_active_streams", "prefix" => prefix.to_string()).increment(1.0);
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        ::metrics::gauge!("gateway_active_streams", "prefix" => self.prefix.clone()).decrement(1.0);
        tracing::debug!(prefix = %self.prefix, "Event stream closed");
    }
}
