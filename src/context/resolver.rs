//! Correlation resolution at the service boundary.
//!
//! # Responsibilities
//! - Adopt an inbound W3C trace parent when it is well formed
//! - Reuse an inbound correlation identifier, or mint one
//! - Produce the request's root [`ContextCarrier`]
//!
//! # Design Decisions
//! - Never fails: the worst case is a minted identifier and a root trace
//! - Trace parent and correlation identifier are resolved independently;
//!   a broken `traceparent` never costs the caller its identifier

use axum::http::HeaderMap;
use opentelemetry::trace::SpanContext;
use tracing::Span;

use crate::context::carrier::ContextCarrier;
use crate::context::correlation::CorrelationId;
use crate::context::propagation::{self, Extracted};

/// Where the correlation identifier came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationSource {
    /// Reused from the named inbound header.
    Inbound(&'static str),
    /// Minted at this boundary.
    Minted,
}

/// What happened to the inbound trace parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceSource {
    /// A well-formed parent was adopted.
    Adopted,
    /// No parent was sent; a root trace was started.
    Root,
    /// A parent was sent but rejected; a root trace was started.
    Rejected,
}

/// Outcome of resolving one inbound request.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub correlation_id: CorrelationId,
    /// Remote parent, with its `tracestate`, when one was adopted.
    pub parent: Option<SpanContext>,
    pub correlation: CorrelationSource,
    pub trace: TraceSource,
}

impl Resolution {
    /// Carrier for the request's server span.
    pub fn carrier(&self, span: &Span) -> ContextCarrier {
        ContextCarrier::for_span(self.correlation_id.clone(), self.parent.clone(), span)
    }
}

/// Resolve the context of an inbound request from its headers.
pub fn resolve(headers: &HeaderMap) -> Resolution {
    let (parent, trace) = match propagation::extract(headers) {
        Extracted::Absent => (None, TraceSource::Root),
        Extracted::Parent(parent) => (Some(parent), TraceSource::Adopted),
        Extracted::Invalid => (None, TraceSource::Rejected),
    };

    let (correlation_id, correlation) = match CorrelationId::from_headers(headers) {
        Some((id, header)) => (id, CorrelationSource::Inbound(header)),
        None => (CorrelationId::generate(), CorrelationSource::Minted),
    };

    Resolution {
        correlation_id,
        parent,
        correlation,
        trace,
    }
}
