//! Outbound call client.
//!
//! # Responsibilities
//! - Issue one downstream request per call, scoped to its own child span
//! - Attach the correlation identifier and trace propagation headers
//! - Enforce the fixed per-call timeout
//! - Classify the result as a decoded response or a typed failure
//!
//! # Design Decisions
//! - Constructed explicitly from configuration; no process-wide client
//! - The inner `reqwest::Client` is a connection pool and is shared by
//!   concurrent calls without locking
//! - `call` never returns early with an error of its own: every path ends
//!   in a [`CallOutcome`] that has been recorded on the call span

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method};
use tracing::{field, Instrument, Span};

use crate::client::outcome::{CallError, CallOutcome, DownstreamResponse};
use crate::context::ContextCarrier;
use crate::observability::metrics;

/// Longest slice of an error body kept in an [`CallError::Http`].
const MAX_ERROR_BODY: usize = 256;

/// Client for calls to downstream services.
#[derive(Debug, Clone)]
pub struct OutboundClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl OutboundClient {
    /// Build a client whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform one downstream call on behalf of `context`.
    ///
    /// A client span and child carrier are derived for the call; the
    /// carrier's correlation identifier and span context are what the
    /// downstream service receives.
    pub async fn call(&self, context: &ContextCarrier, method: Method, target: &str) -> CallOutcome {
        let span = tracing::info_span!(
            "outbound_call",
            otel.kind = "client",
            trace.id = %context.correlation_id(),
            http.method = %method,
            http.url = %target,
            http.status_code = field::Empty,
            otel.status_code = field::Empty,
        );
        let mut carrier = context.child_span("outbound_call", &span);
        carrier.set_attribute("http.method", method.as_str());
        carrier.set_attribute("http.url", target);

        let started = Instant::now();
        let outcome = self
            .execute(&carrier, method, target)
            .instrument(span.clone())
            .await;

        match &outcome {
            Ok(response) => {
                span.record("otel.status_code", "OK");
                tracing::info!(
                    parent: &span,
                    trace.id = %carrier.correlation_id(),
                    response_service = %response.service,
                    "Received response from {}: {}",
                    response.service,
                    response.message
                );
                metrics::record_outbound_call(target, "success", started);
            }
            Err(e) => {
                span.record("otel.status_code", "ERROR");
                tracing::error!(
                    parent: &span,
                    trace.id = %carrier.correlation_id(),
                    error.kind = e.kind().as_str(),
                    exception.message = %e,
                    "Outbound call failed"
                );
                metrics::record_outbound_call(target, e.kind().as_str(), started);
            }
        }

        outcome
    }

    async fn execute(&self, carrier: &ContextCarrier, method: Method, target: &str) -> CallOutcome {
        let mut headers = HeaderMap::new();
        carrier.inject(&mut headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(
            trace.id = %carrier.correlation_id(),
            traceparent = %carrier.traceparent().unwrap_or_default(),
            "Making {} request to {}",
            method,
            target
        );

        let response = self
            .http
            .request(method, target)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&body)
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(CallError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice::<DownstreamResponse>(&body)
            .map_err(|e| CallError::Decode(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> CallError {
        if e.is_timeout() {
            return CallError::Timeout(self.timeout);
        }
        CallError::Transport(error_chain(&e))
    }
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(e: &dyn StdError) -> String {
    let mut rendered = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
