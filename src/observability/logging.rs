//! Structured logging and span export.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level at runtime
//! - Export spans over OTLP when a collector endpoint is configured
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level
//! - Spans reach the collector through a `tracing-opentelemetry` layer on
//!   the same registry, so every `tracing` span is also an OTel span
//! - The W3C propagator is installed globally even without an exporter

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ObservabilityConfig};

/// Instrumentation scope of exported spans.
const TRACER_NAME: &str = "trace-orchestrator";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter for {endpoint}: {reason}")]
    Exporter { endpoint: String, reason: String },
}

/// Flushes and stops span export when dropped. Hold it for the life of
/// the process.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    pub fn exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush spans: {}", e);
            }
        }
    }
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "trace_orchestrator={level},tower_http={level}",
        level = config.log_level
    )
}

/// Resource attributes identifying this service on exported spans.
pub fn resource(config: &ObservabilityConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

/// Build the tracer provider for `endpoint`. Must run inside the Tokio
/// runtime, which drives the batch exporter.
fn tracer_provider(
    config: &ObservabilityConfig,
    endpoint: &str,
) -> Result<TracerProvider, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource(config))
        .build())
}

/// Install the global subscriber. Call once, from `main`.
pub fn init_logging(config: &ObservabilityConfig) -> Result<TelemetryGuard, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| tracer_provider(config, endpoint))
        .transpose()?;

    let otel_layer = provider.as_ref().map(|provider| {
        global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_NAME))
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);

    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!(
            otlp_endpoint = %endpoint,
            service = %config.service_name,
            "Exporting spans over OTLP"
        );
    }

    Ok(TelemetryGuard { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_configured_level() {
        let config = ObservabilityConfig {
            log_level: "debug".into(),
            ..ObservabilityConfig::default()
        };
        assert_eq!(
            default_filter(&config),
            "trace_orchestrator=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_resource_names_the_service() {
        let config = ObservabilityConfig {
            service_name: "service-a-canary".into(),
            ..ObservabilityConfig::default()
        };
        let resource = resource(&config);
        assert_eq!(
            resource
                .get(opentelemetry::Key::new("service.name"))
                .map(|v| v.to_string()),
            Some("service-a-canary".to_string())
        );
    }

    // The batch exporter blocks on shutdown and needs a second worker.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_provider_builds_for_endpoint() {
        let config = ObservabilityConfig::default();
        // The tonic channel connects lazily, so no collector is needed.
        let provider = tracer_provider(&config, "http://127.0.0.1:4317").unwrap();
        let guard = TelemetryGuard {
            provider: Some(provider),
        };
        assert!(guard.exporting());
    }
}
