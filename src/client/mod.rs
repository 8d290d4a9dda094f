//! Outbound call subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator step (ContextCarrier, method, target)
//!     → outbound.rs (child span + child carrier, inject headers, send)
//!     → status check → body decode
//!     → outcome.rs (DownstreamResponse | CallError)
//! ```
//!
//! # Design Decisions
//! - Failures are values, never panics or early returns past `call`
//! - Error taxonomy: transport_error, http_error, decode_error; the
//!   orchestrator adds upstream_partial for failures it tolerates

pub mod outbound;
pub mod outcome;

pub use outbound::OutboundClient;
pub use outcome::{CallError, CallOutcome, DownstreamResponse, ErrorKind};
