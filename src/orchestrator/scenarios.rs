//! Failure scenarios.
//!
//! Each scenario targets downstream endpoints that are expected to fail
//! and shows one way a failure can be handled:
//!
//! ```text
//! partial : B ok → C fails           → 200, failure reported as data
//! cascade : B ok → C fails upstream  → 500, names where it broke
//! chain   : B ok → C ok → B fails    → 206, earlier results kept
//! ```

use axum::http::StatusCode;
use serde_json::{Map, Value};

use super::{response_value, Downstream, Orchestrator, Pattern};
use crate::client::ErrorKind;
use crate::context::ContextCarrier;
use crate::http::response::Reply;
use crate::observability::metrics;
use crate::observability::tracing::record_exception;

const PARTIAL_FAILURE: &str = "partial_failure";
const CHAIN_FAILURE_AT_STEP_3: &str = "chain_failure_at_step_3";

impl Orchestrator {
    /// Service B succeeds, service C's error endpoint fails.
    ///
    /// The C failure is tolerated: 200 with the B response and the C error.
    /// A B failure is unexpected and aborts with 500.
    pub async fn partial(&self, carrier: &ContextCarrier) -> Reply {
        self.run_pattern(Pattern::PartialFailure, carrier, move |ctx, span| async move {
            let step_b = self.step("call_service_b_success", Downstream::ServiceB, "/api/process");
            let response_b = match self.run_step(&ctx, &step_b).await {
                Ok(response) => response,
                Err(e) => {
                    record_exception(&span, &ctx, &e, e.kind());
                    return self.abort(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Unexpected failure in Service B: {}", e),
                        carrier,
                        Downstream::ServiceB.key(),
                        &e,
                    );
                }
            };

            let step_c = self.step("call_service_c_error", Downstream::ServiceC, "/api/error");
            let service_c_error = match self.run_step(&ctx, &step_c).await {
                Ok(_) => "No error occurred (unexpected)".to_string(),
                Err(e) => {
                    record_exception(&span, &ctx, &e, ErrorKind::UpstreamPartial);
                    metrics::record_tolerated_failure(Pattern::PartialFailure.as_str());
                    e.to_string()
                }
            };

            let mut data = Map::new();
            data.insert("service_b_success".to_string(), response_value(&response_b));
            data.insert("service_c_error".to_string(), Value::from(service_c_error));
            data.insert("scenario".to_string(), Value::from(PARTIAL_FAILURE));
            Reply::ok(self.envelope(
                "Partial failure scenario - Service B succeeded, Service C failed",
                carrier,
                Some(data),
            ))
        })
        .await
    }

    /// Service B, then service C's endpoint that itself fails calling back.
    ///
    /// Any failure aborts with 500, naming whether it started at B or
    /// propagated through C.
    pub async fn cascade(&self, carrier: &ContextCarrier) -> Reply {
        self.run_pattern(Pattern::CascadeFailure, carrier, move |ctx, span| async move {
            let steps = [
                self.step("cascade_call_service_b", Downstream::ServiceB, "/api/process"),
                self.step(
                    "cascade_call_service_c",
                    Downstream::ServiceC,
                    "/api/call-service-a-error",
                ),
            ];
            let outcome = self.sequence(&ctx, &steps).await;

            if let Some((index, e)) = outcome.failed {
                record_exception(&span, &ctx, &e, e.kind());
                let message = if index == 0 {
                    format!("Cascade failure started at Service B: {}", e)
                } else {
                    format!("Cascade failure propagated through Service C: {}", e)
                };
                return self.abort(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    message,
                    carrier,
                    steps[index].downstream.key(),
                    &e,
                );
            }

            let mut data = Map::new();
            for (step, response) in steps.iter().zip(&outcome.completed) {
                data.insert(step.downstream.key().to_string(), response_value(response));
            }
            Reply::ok(self.envelope("Cascade failure scenario completed", carrier, Some(data)))
        })
        .await
    }

    /// Three-step chain whose last step targets service B's error endpoint.
    ///
    /// Steps 1 and 2 failing break the chain (500). Step 3 failing is the
    /// expected outcome and yields 206 with the earlier results; step 3
    /// succeeding yields 200.
    pub async fn chain(&self, carrier: &ContextCarrier) -> Reply {
        self.run_pattern(Pattern::ChainFailure, carrier, move |ctx, span| async move {
            let steps = [
                self.step("chain_step_1_service_b", Downstream::ServiceB, "/api/process"),
                self.step("chain_step_2_service_c", Downstream::ServiceC, "/api/process"),
                self.step("chain_step_3_service_b_error", Downstream::ServiceB, "/api/error"),
            ];
            let outcome = self.sequence(&ctx, &steps).await;
            let completed: Vec<Value> = outcome.completed.iter().map(response_value).collect();

            match outcome.failed {
                Some((index, e)) if index < 2 => {
                    record_exception(&span, &ctx, &e, e.kind());
                    let step = index + 1;
                    self.abort(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Chain broken at step {}: {}", step, e),
                        carrier,
                        &format!("step_{}", step),
                        &e,
                    )
                }
                Some((_, e)) => {
                    record_exception(&span, &ctx, &e, ErrorKind::UpstreamPartial);
                    metrics::record_tolerated_failure(Pattern::ChainFailure.as_str());

                    let mut data = Map::new();
                    for (index, response) in completed.into_iter().enumerate() {
                        data.insert(format!("step_{}_success", index + 1), response);
                    }
                    data.insert("step_3_failure".to_string(), Value::from(e.to_string()));
                    data.insert("scenario".to_string(), Value::from(CHAIN_FAILURE_AT_STEP_3));
                    Reply::new(
                        StatusCode::PARTIAL_CONTENT,
                        self.envelope(
                            "Chain failure scenario - failed at step 3 as expected",
                            carrier,
                            Some(data),
                        ),
                    )
                }
                None => {
                    let mut data = Map::new();
                    for (index, response) in completed.into_iter().enumerate() {
                        data.insert(format!("step_{}", index + 1), response);
                    }
                    Reply::ok(self.envelope(
                        "Chain failure scenario completed unexpectedly without failure",
                        carrier,
                        Some(data),
                    ))
                }
            }
        })
        .await
    }
}
