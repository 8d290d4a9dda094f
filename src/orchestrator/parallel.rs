//! Concurrent fan-out.
//!
//! # Responsibilities
//! - Issue N branch calls concurrently, each with its own child carrier
//! - Join every branch before reducing; a failed branch never cancels
//!   its siblings
//! - Merge outcomes into one data map: successes under the service key,
//!   failures under `<key>_error`
//!
//! The parallel pattern and the timeout scenario are both fan-outs; they
//! differ only in the endpoints they target.

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::Span;

use super::{response_value, Downstream, Orchestrator, Pattern, Step};
use crate::client::{CallOutcome, ErrorKind};
use crate::context::ContextCarrier;
use crate::http::response::Reply;
use crate::observability::metrics;
use crate::observability::tracing::record_exception;

impl Orchestrator {
    /// Call service B and service C concurrently.
    ///
    /// Always 200; branch failures are reported in the data map.
    pub async fn parallel(&self, carrier: &ContextCarrier) -> Reply {
        self.run_pattern(Pattern::Parallel, carrier, move |ctx, span| async move {
            let steps = vec![
                self.step("call_service_b", Downstream::ServiceB, "/api/process"),
                self.step("call_service_c", Downstream::ServiceC, "/api/process"),
            ];
            let outcomes = self.fan_out(&ctx, &steps).await;
            let data = merge_outcomes(Pattern::Parallel, &span, &ctx, &steps, &outcomes);
            Reply::ok(self.envelope("Parallel calls completed", carrier, Some(data)))
        })
        .await
    }

    /// Fan out to service B's normal endpoint and service C's slow one.
    ///
    /// The slow branch is expected to exceed the call timeout and shows up
    /// as `service_c_error`; the request itself still succeeds.
    pub async fn timeout_scenario(&self, carrier: &ContextCarrier) -> Reply {
        self.run_pattern(Pattern::TimeoutFailure, carrier, move |ctx, span| async move {
            let steps = vec![
                self.step("call_service_b", Downstream::ServiceB, "/api/process"),
                self.step("call_service_c_timeout", Downstream::ServiceC, "/api/timeout"),
            ];
            let outcomes = self.fan_out(&ctx, &steps).await;
            let data = merge_outcomes(Pattern::TimeoutFailure, &span, &ctx, &steps, &outcomes);
            Reply::ok(self.envelope("Timeout failure scenario completed", carrier, Some(data)))
        })
        .await
    }

    /// Run every step concurrently; outcomes come back in step order.
    pub async fn fan_out(&self, pattern_ctx: &ContextCarrier, steps: &[Step]) -> Vec<CallOutcome> {
        join_all(steps.iter().map(|step| self.run_step(pattern_ctx, step))).await
    }
}

/// Reduce branch outcomes into the response data map.
fn merge_outcomes(
    pattern: Pattern,
    span: &Span,
    ctx: &ContextCarrier,
    steps: &[Step],
    outcomes: &[CallOutcome],
) -> Map<String, Value> {
    let mut data = Map::new();
    for (step, outcome) in steps.iter().zip(outcomes) {
        let key = step.downstream.key();
        match outcome {
            Ok(response) => {
                data.insert(key.to_string(), response_value(response));
            }
            Err(e) => {
                record_exception(span, ctx, e, ErrorKind::UpstreamPartial);
                metrics::record_tolerated_failure(pattern.as_str());
                data.insert(format!("{}_error", key), Value::from(e.to_string()));
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CallError, DownstreamResponse, OutboundClient};
    use std::time::Duration;

    fn steps() -> (Orchestrator, Vec<Step>) {
        let orchestrator = Orchestrator::new(
            OutboundClient::new(Duration::from_secs(1)).unwrap(),
            "service-a",
            "http://service-b:3000",
            "http://service-c:5000",
        );
        let steps = vec![
            orchestrator.step("call_service_b", Downstream::ServiceB, "/api/process"),
            orchestrator.step("call_service_c", Downstream::ServiceC, "/api/process"),
        ];
        (orchestrator, steps)
    }

    fn response(service: &str) -> DownstreamResponse {
        DownstreamResponse {
            service: service.to_string(),
            message: "ok".to_string(),
            trace_id: "req-1".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_merge_all_success() {
        let (_, steps) = steps();
        let ctx = ContextCarrier::new("req-1".into(), None);
        let outcomes = vec![Ok(response("service-b")), Ok(response("service-c"))];

        let data = merge_outcomes(Pattern::Parallel, &Span::none(), &ctx, &steps, &outcomes);

        assert_eq!(data.len(), 2);
        assert_eq!(data["service_b"]["service"], "service-b");
        assert_eq!(data["service_c"]["service"], "service-c");
    }

    #[test]
    fn test_merge_keeps_success_beside_failure() {
        let (_, steps) = steps();
        let ctx = ContextCarrier::new("req-1".into(), None);
        let outcomes = vec![
            Ok(response("service-b")),
            Err(CallError::Http {
                status: 500,
                body: "boom".into(),
            }),
        ];

        let data = merge_outcomes(Pattern::Parallel, &Span::none(), &ctx, &steps, &outcomes);

        assert_eq!(data["service_b"]["service"], "service-b");
        assert_eq!(data["service_c_error"], "upstream returned status 500: boom");
        assert!(!data.contains_key("service_c"));
        assert!(!data.contains_key("service_b_error"));
    }

    #[tokio::test]
    async fn test_parallel_with_unreachable_downstreams_still_ok() {
        let orchestrator = Orchestrator::new(
            OutboundClient::new(Duration::from_secs(1)).unwrap(),
            "service-a",
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
        );
        let carrier = ContextCarrier::new("req-7".into(), None);

        let reply = orchestrator.parallel(&carrier).await;

        assert_eq!(reply.status, axum::http::StatusCode::OK);
        assert_eq!(reply.envelope.message, "Parallel calls completed");
        let data = reply.envelope.data.unwrap();
        assert!(data.get("service_b_error").is_some());
        assert!(data.get("service_c_error").is_some());
    }
}
