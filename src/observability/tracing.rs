//! Span construction for the request call tree.
//!
//! # Responsibilities
//! - Create the server span of an inbound request
//! - Create pattern and step spans linked to their carriers
//! - Record failures on a span as exception events
//!
//! # Design Decisions
//! - Span names are static; the logical operation name goes in `otel.name`
//!   so exporters can still show `call_service_b`, `chain_step_3_...` etc.
//! - Every span carries `trace.id` (correlation identifier); W3C trace and
//!   span identifiers come from the OpenTelemetry layer, and carriers are
//!   parented on these spans with `set_parent`
//! - Spans are built before their carriers so the identifiers a downstream
//!   receives match the exported span

use axum::http::{Method, Uri};
use ::tracing::{field, Span};

use crate::client::{CallError, ErrorKind};
use crate::context::{ContextCarrier, CorrelationId, CorrelationSource, Resolution, TraceSource};

/// Server span for an inbound request.
///
/// Created before the request's carrier, which then takes this span's
/// OpenTelemetry identifiers.
pub fn inbound_span(resolution: &Resolution, method: &Method, uri: &Uri) -> Span {
    ::tracing::info_span!(
        "inbound_request",
        otel.kind = "server",
        trace.id = %resolution.correlation_id,
        trace.id.minted = matches!(resolution.correlation, CorrelationSource::Minted),
        trace.parent_adopted = matches!(resolution.trace, TraceSource::Adopted),
        http.method = %method,
        http.url = %uri,
        http.status_code = field::Empty,
    )
}

/// Span for one orchestration pattern.
pub fn pattern_span(pattern: &'static str, correlation_id: &CorrelationId) -> Span {
    ::tracing::info_span!(
        "pattern",
        otel.name = pattern,
        trace.id = %correlation_id,
        otel.status_code = field::Empty,
    )
}

/// Span for one step of a pattern.
pub fn step_span(step: &'static str, correlation_id: &CorrelationId) -> Span {
    ::tracing::info_span!(
        "step",
        otel.name = step,
        trace.id = %correlation_id,
    )
}

/// Record a failed call on `span`.
///
/// `kind` is the call's own kind for aborting failures, or
/// [`ErrorKind::UpstreamPartial`] when the failure is reported as data.
pub fn record_exception(span: &Span, carrier: &ContextCarrier, error: &CallError, kind: ErrorKind) {
    if kind == ErrorKind::UpstreamPartial {
        ::tracing::warn!(
            parent: span,
            trace.id = %carrier.correlation_id(),
            error.kind = kind.as_str(),
            error.cause = error.kind().as_str(),
            exception.message = %error,
            "Downstream failure tolerated"
        );
    } else {
        span.record("otel.status_code", "ERROR");
        ::tracing::error!(
            parent: span,
            trace.id = %carrier.correlation_id(),
            error.kind = kind.as_str(),
            exception.message = %error,
            "Downstream failure"
        );
    }
}
