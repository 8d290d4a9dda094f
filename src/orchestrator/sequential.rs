//! Ordered calls that stop at the first failure.

use axum::http::StatusCode;
use serde_json::Map;

use super::{response_value, Downstream, Orchestrator, Pattern, Step};
use crate::client::{CallError, DownstreamResponse};
use crate::context::ContextCarrier;
use crate::http::response::Reply;
use crate::observability::tracing::record_exception;

/// Result of running steps in order.
#[derive(Debug)]
pub struct SequenceOutcome {
    /// Responses of the steps that succeeded, in order.
    pub completed: Vec<DownstreamResponse>,
    /// Index and error of the step that failed, if any. Steps after it
    /// were never issued.
    pub failed: Option<(usize, CallError)>,
}

impl Orchestrator {
    /// Call service B, then service C.
    ///
    /// Any failure aborts with 500 naming the failed service.
    pub async fn sequential(&self, carrier: &ContextCarrier) -> Reply {
        self.run_pattern(Pattern::Sequential, carrier, move |ctx, span| async move {
            let steps = [
                self.step("call_service_b", Downstream::ServiceB, "/api/process"),
                self.step("call_service_c", Downstream::ServiceC, "/api/process"),
            ];
            let outcome = self.sequence(&ctx, &steps).await;

            if let Some((index, e)) = outcome.failed {
                let step = &steps[index];
                record_exception(&span, &ctx, &e, e.kind());
                return self.abort(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to call {}: {}", step.downstream.label(), e),
                    carrier,
                    step.downstream.key(),
                    &e,
                );
            }

            let mut data = Map::new();
            for (step, response) in steps.iter().zip(&outcome.completed) {
                data.insert(step.downstream.key().to_string(), response_value(response));
            }
            Reply::ok(self.envelope("Sequential calls completed", carrier, Some(data)))
        })
        .await
    }

    /// Run `steps` one after another, stopping at the first failure.
    pub async fn sequence(&self, pattern_ctx: &ContextCarrier, steps: &[Step]) -> SequenceOutcome {
        let mut completed = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            match self.run_step(pattern_ctx, step).await {
                Ok(response) => completed.push(response),
                Err(e) => {
                    return SequenceOutcome {
                        completed,
                        failed: Some((index, e)),
                    }
                }
            }
        }
        SequenceOutcome {
            completed,
            failed: None,
        }
    }
}
