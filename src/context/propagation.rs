//! W3C Trace Context over HTTP headers.
//!
//! # Responsibilities
//! - Adapt `HeaderMap` to OpenTelemetry's `Extractor` / `Injector`
//! - Read an inbound `traceparent` / `tracestate` pair into a `SpanContext`
//! - Write a `SpanContext` back out onto outbound headers
//! - Mint trace and span identifiers
//!
//! # Design Decisions
//! - Parsing and formatting are delegated to `TraceContextPropagator`; this
//!   module only bridges header maps
//! - The propagator is constructed locally rather than read from the
//!   global, so propagation works whether or not an exporter is installed
//! - A `traceparent` sent twice and merged by a proxy into a comma-joined
//!   value is read by its first entry

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceId};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};

pub const TRACEPARENT: &str = "traceparent";
pub const TRACESTATE: &str = "tracestate";

/// Read-only view of inbound headers for the propagator.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        let value = self.0.get(key)?.to_str().ok()?;
        if key == TRACEPARENT {
            return value.split(',').next().map(str::trim);
        }
        Some(value)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Write access to outbound headers for the propagator.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        // The propagator always writes tracestate, even when it is empty.
        if value.is_empty() {
            return;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// What an inbound request said about its trace parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// No `traceparent` header.
    Absent,
    /// A valid remote parent, with its `tracestate`.
    Parent(SpanContext),
    /// A `traceparent` header that the propagator rejected.
    Invalid,
}

/// Read the trace parent of an inbound request.
pub fn extract(headers: &HeaderMap) -> Extracted {
    if !headers.contains_key(TRACEPARENT) {
        return Extracted::Absent;
    }
    let cx = TraceContextPropagator::new().extract(&HeaderExtractor(headers));
    let span_context = cx.span().span_context().clone();
    if span_context.is_valid() {
        Extracted::Parent(span_context)
    } else {
        Extracted::Invalid
    }
}

/// Write the `traceparent` / `tracestate` of `cx` onto `headers`.
pub fn inject(cx: &Context, headers: &mut HeaderMap) {
    TraceContextPropagator::new().inject_context(cx, &mut HeaderInjector(headers));
}

/// Parse a single `traceparent` value.
pub fn parse_traceparent(value: &str) -> Option<SpanContext> {
    let mut headers = HeaderMap::new();
    headers.insert(TRACEPARENT, HeaderValue::from_str(value).ok()?);
    match extract(&headers) {
        Extracted::Parent(span_context) => Some(span_context),
        Extracted::Absent | Extracted::Invalid => None,
    }
}

/// Header form of `span_context`, or `None` when it is not valid.
pub fn format_traceparent(span_context: &SpanContext) -> Option<String> {
    let cx = Context::new().with_remote_span_context(span_context.clone());
    let mut headers = HeaderMap::new();
    inject(&cx, &mut headers);
    headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn new_trace_id() -> TraceId {
    RandomIdGenerator::default().new_trace_id()
}

pub fn new_span_id() -> SpanId {
    RandomIdGenerator::default().new_span_id()
}
