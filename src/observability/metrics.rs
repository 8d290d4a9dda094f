//! Metrics collection and exposition.
//!
//! # Metrics
//! - `orchestrator_requests_total` (counter): requests by pattern, status
//! - `orchestrator_request_duration_seconds` (histogram): latency per pattern
//! - `orchestrator_tolerated_failures_total` (counter): failures reported as data
//! - `outbound_calls_total` (counter): downstream calls by target, outcome
//! - `outbound_call_duration_seconds` (histogram): downstream latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Targets are labelled by `host:port`, never by full URL

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;
use url::Url;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(pattern: &'static str, status: u16, started: Instant) {
    ::metrics::counter!(
        "orchestrator_requests_total",
        "pattern" => pattern,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("orchestrator_request_duration_seconds", "pattern" => pattern)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_tolerated_failure(pattern: &'static str) {
    ::metrics::counter!("orchestrator_tolerated_failures_total", "pattern" => pattern)
        .increment(1);
}

pub fn record_outbound_call(target: &str, outcome: &'static str, started: Instant) {
    let target = target_label(target);
    ::metrics::counter!(
        "outbound_calls_total",
        "target" => target.clone(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("outbound_call_duration_seconds", "target" => target)
        .record(started.elapsed().as_secs_f64());
}

/// `host:port` of a target URL, or `"invalid"`.
fn target_label(target: &str) -> String {
    Url::parse(target)
        .ok()
        .and_then(|url| {
            let host = url.host_str()?.to_string();
            Some(match url.port_or_known_default() {
                Some(port) => format!("{}:{}", host, port),
                None => host,
            })
        })
        .unwrap_or_else(|| "invalid".to_string())
}
