//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, OTLP span export)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (spans carrying trace.id, parented via OpenTelemetry)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Distributed tracing backend (OTLP gRPC collector)
//! ```
//!
//! # Design Decisions
//! - Correlation identifier is a field on every span of a request
//! - Metrics are cheap (atomic increments) and off by default

pub mod logging;
pub mod metrics;
pub mod tracing;
