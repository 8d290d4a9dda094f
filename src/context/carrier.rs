//! Propagable per-request context.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderValue};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::Context;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::context::correlation::{CorrelationId, X_TRACE_ID};
use crate::context::propagation::{self, new_span_id, new_trace_id};

/// Attribute key under which the correlation identifier is recorded.
pub const TRACE_ID_ATTRIBUTE: &str = "trace.id";

/// Correlation identifier, OpenTelemetry span context and span attributes
/// of one operation in a request's call tree.
///
/// Carriers are values: every child operation gets its own via
/// [`ContextCarrier::child`] or [`ContextCarrier::child_span`], so
/// concurrent siblings never share attribute state.
///
/// When a `tracing` span is attached, the carrier takes the span context
/// the OpenTelemetry layer assigned to it, so the identifiers sent
/// downstream are the ones the exporter reports. Without the layer the
/// carrier mints its own.
#[derive(Debug, Clone)]
pub struct ContextCarrier {
    correlation_id: CorrelationId,
    span_context: SpanContext,
    parent_span_id: Option<SpanId>,
    attributes: BTreeMap<String, String>,
}

impl ContextCarrier {
    /// Carrier for the first span this service opens for a request.
    ///
    /// With a valid remote `parent` the span joins that trace and keeps its
    /// `tracestate`; otherwise it starts a new root trace.
    pub fn new(correlation_id: CorrelationId, parent: Option<SpanContext>) -> Self {
        let (span_context, parent_span_id) = match parent.filter(SpanContext::is_valid) {
            Some(parent) => (child_of(&parent), Some(parent.span_id())),
            None => (
                SpanContext::new(
                    new_trace_id(),
                    new_span_id(),
                    TraceFlags::SAMPLED,
                    false,
                    TraceState::default(),
                ),
                None,
            ),
        };

        let mut attributes = BTreeMap::new();
        attributes.insert(TRACE_ID_ATTRIBUTE.to_string(), correlation_id.to_string());

        Self {
            correlation_id,
            span_context,
            parent_span_id,
            attributes,
        }
    }

    /// Carrier for `span`, the server span of an inbound request.
    ///
    /// The remote parent, if any, becomes the span's OpenTelemetry parent.
    pub fn for_span(correlation_id: CorrelationId, parent: Option<SpanContext>, span: &Span) -> Self {
        let parent = parent.filter(SpanContext::is_valid);
        if let Some(parent) = &parent {
            span.set_parent(Context::new().with_remote_span_context(parent.clone()));
        }
        let mut carrier = Self::new(correlation_id, parent);
        carrier.adopt(span);
        carrier
    }

    /// Derive the carrier of a child operation.
    ///
    /// The correlation identifier and trace are kept; the span identifier
    /// is new and the attributes start over.
    pub fn child(&self, name: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("span.name".to_string(), name.to_string());
        attributes.insert(TRACE_ID_ATTRIBUTE.to_string(), self.correlation_id.to_string());

        Self {
            correlation_id: self.correlation_id.clone(),
            span_context: child_of(&self.span_context),
            parent_span_id: Some(self.span_context.span_id()),
            attributes,
        }
    }

    /// Derive the carrier of a child operation recorded by `span`.
    ///
    /// `span` is parented on this carrier's span context.
    pub fn child_span(&self, name: &str, span: &Span) -> Self {
        span.set_parent(self.otel_context());
        let mut child = self.child(name);
        child.adopt(span);
        child
    }

    /// Take the identifiers the OpenTelemetry layer assigned to `span`.
    fn adopt(&mut self, span: &Span) {
        let cx = span.context();
        let otel_span = cx.span();
        let assigned = otel_span.span_context();
        if assigned.is_valid() {
            self.span_context = SpanContext::new(
                assigned.trace_id(),
                assigned.span_id(),
                assigned.trace_flags(),
                false,
                self.span_context.trace_state().clone(),
            );
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    pub fn trace_id(&self) -> TraceId {
        self.span_context.trace_id()
    }

    pub fn span_id(&self) -> SpanId {
        self.span_context.span_id()
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn trace_state(&self) -> &TraceState {
        self.span_context.trace_state()
    }

    /// OpenTelemetry context with this carrier's span as the active span.
    pub fn otel_context(&self) -> Context {
        Context::new().with_remote_span_context(self.span_context.clone())
    }

    /// The `traceparent` header this carrier sends downstream.
    pub fn traceparent(&self) -> Option<String> {
        propagation::format_traceparent(&self.span_context)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Write the propagation headers for an outbound request.
    ///
    /// The correlation identifier and the trace context are written
    /// independently: a value that cannot be encoded is skipped without
    /// affecting the other.
    pub fn inject(&self, headers: &mut HeaderMap) {
        match HeaderValue::from_str(self.correlation_id.as_str()) {
            Ok(value) => {
                headers.insert(X_TRACE_ID, value);
            }
            Err(_) => {
                tracing::warn!(
                    trace.id = %self.correlation_id,
                    "Correlation identifier is not a valid header value, not propagated"
                );
            }
        }

        propagation::inject(&self.otel_context(), headers);
    }
}

fn child_of(parent: &SpanContext) -> SpanContext {
    SpanContext::new(
        parent.trace_id(),
        new_span_id(),
        parent.trace_flags(),
        false,
        parent.trace_state().clone(),
    )
}
