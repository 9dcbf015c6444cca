//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (calls, latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `service_requests_total` (counter): calls by endpoint, outcome
//! - `service_request_duration_seconds` (histogram): latency by endpoint
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it is a no-op
//! - Outcome is the status class, keeping label cardinality low

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "service_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "service_request_duration_seconds";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome label for a status code.
pub fn outcome(status: u16) -> &'static str {
    match status {
        200..=399 => "success",
        400..=499 => "client_error",
        _ => "server_error",
    }
}

/// Record one completed service call.
pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    metrics::counter!(REQUESTS_TOTAL, "endpoint" => endpoint, "outcome" => outcome(status)).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classes() {
        assert_eq!(outcome(200), "success");
        assert_eq!(outcome(304), "success");
        assert_eq!(outcome(404), "client_error");
        assert_eq!(outcome(500), "server_error");
        assert_eq!(outcome(0), "server_error");
    }

    #[test]
    fn test_record_without_recorder() {
        record_request("noop", 200, Instant::now());
    }
}
