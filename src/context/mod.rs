//! Request context subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound headers (x-trace-id / x-amzn-trace-id, traceparent, tracestate)
//!     → propagation.rs (TraceContextPropagator over the HeaderMap)
//!     → resolver.rs (adopt or mint)
//!     → carrier.rs (ContextCarrier for the request's server span)
//!     → handed explicitly to the orchestrator
//!     → carrier.child_span() per pattern / step / outbound call
//!     → carrier.inject() onto outbound headers
//! ```
//!
//! # Design Decisions
//! - The carrier is a plain value passed as a parameter, never looked up
//!   from task-local or global state
//! - Correlation identifier and trace parent fail independently

pub mod carrier;
pub mod correlation;
pub mod propagation;
pub mod resolver;

pub use carrier::ContextCarrier;
pub use correlation::{CorrelationId, X_TRACE_ID};
pub use resolver::{resolve, CorrelationSource, Resolution, TraceSource};
pub use propagation::{format_traceparent, parse_traceparent, TRACEPARENT, TRACESTATE};
