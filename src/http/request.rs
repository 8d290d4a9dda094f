//! Inbound request correlation.
//!
//! # Responsibilities
//! - Resolve the correlation identifier and W3C trace reference of every
//!   inbound request before any handler runs
//! - Hand the resulting [`ContextCarrier`] to handlers via request extensions
//! - Echo the correlation identifier on every response as `X-Trace-ID`
//!
//! # Design Decisions
//! - The carrier is an explicit value on the request, never ambient state;
//!   concurrent requests cannot observe each other's identifiers
//! - An invalid `traceparent` is not an error: the request gets a new root
//!   and the rejection is logged at debug level

use axum::extract::Request;
use axum::http::header::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::context::{resolve, CorrelationSource, Resolution, TraceSource, X_TRACE_ID};
use crate::observability::tracing::inbound_span;

/// Middleware resolving the request context. Install with
/// `axum::middleware::from_fn(correlate)`.
pub async fn correlate(mut request: Request, next: Next) -> Response {
    let resolution = resolve(request.headers());
    let span = inbound_span(&resolution, request.method(), request.uri());

    for notice in notices(&resolution) {
        tracing::debug!(parent: &span, trace.id = %resolution.correlation_id, "{}", notice);
    }

    let carrier = resolution.carrier(&span);
    let correlation_id = carrier.correlation_id().clone();
    request.extensions_mut().insert(carrier);

    let mut response = next.run(request).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(X_TRACE_ID), value);
    }
    span.record("http.status_code", response.status().as_u16());

    response
}

/// Debug notices for a resolution. A rejected parent and a minted
/// identifier are independent and both get reported.
fn notices(resolution: &Resolution) -> Vec<&'static str> {
    let mut notices = Vec::new();
    if resolution.trace == TraceSource::Rejected {
        notices.push("Ignoring invalid traceparent");
    }
    if resolution.correlation == CorrelationSource::Minted {
        notices.push("Minted correlation identifier");
    }
    notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use axum::routing::get;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    use crate::context::ContextCarrier;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(carrier): Extension<ContextCarrier>| async move {
                    format!(
                        "{}|{}",
                        carrier.correlation_id(),
                        carrier.trace_id()
                    )
                }),
            )
            .layer(axum::middleware::from_fn(correlate))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_inbound_id_is_passed_through() {
        let request = http::Request::builder()
            .uri("/")
            .header("X-Trace-ID", "client-123")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-trace-id"], "client-123");
        assert!(body_string(response).await.starts_with("client-123|"));
    }

    #[tokio::test]
    async fn test_missing_id_is_minted_and_echoed() {
        let request = http::Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();

        let header = response.headers()["x-trace-id"].to_str().unwrap().to_string();
        assert!(header.starts_with("trace-"));
        assert!(body_string(response).await.starts_with(&format!("{}|", header)));
    }

    #[tokio::test]
    async fn test_traceparent_trace_id_is_adopted() {
        let request = http::Request::builder()
            .uri("/")
            .header(
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            )
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert!(body_string(response)
            .await
            .ends_with("|4bf92f3577b34da6a3ce929d0e0e4736"));
    }

    #[tokio::test]
    async fn test_header_stamped_on_unrouted_response() {
        let request = http::Request::builder()
            .uri("/missing")
            .header("x-trace-id", "lost-1")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-trace-id"], "lost-1");
    }

    #[test]
    fn test_rejected_parent_and_minted_id_are_both_reported() {
        let mut headers = http::HeaderMap::new();
        headers.insert("traceparent", HeaderValue::from_static("00-zz-zz-01"));

        let resolution = resolve(&headers);

        assert_eq!(
            notices(&resolution),
            vec!["Ignoring invalid traceparent", "Minted correlation identifier"]
        );
    }

    #[test]
    fn test_clean_request_has_no_notices() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-trace-id", HeaderValue::from_static("req-1"));

        assert!(notices(&resolve(&headers)).is_empty());
    }
}
