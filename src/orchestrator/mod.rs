//! Call orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! Handler (request ContextCarrier)
//!     → Orchestrator::<pattern>()
//!         → pattern carrier + span (parallel_calls, chain_failure_scenario, ...)
//!         → parallel.rs  : fan_out()  : branches joined, outcomes in step order
//!         → sequential.rs: sequence() : stops at the first failure
//!         → scenarios.rs : partial / cascade / chain fixtures
//!     → outcomes reduced into a data map
//!     → Envelope + status (Reply)
//! ```
//!
//! # Design Decisions
//! - Every step derives its own child carrier from the pattern carrier;
//!   siblings never share mutable state
//! - Call failures never escape: each pattern decides whether a failure
//!   aborts (500/502) or is reported under an `*_error` key
//! - No retries anywhere; every failure is terminal for its call

pub mod parallel;
pub mod scenarios;
pub mod sequential;

use std::future::Future;
use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{Instrument, Span};

use crate::client::{CallError, CallOutcome, DownstreamResponse, OutboundClient};
use crate::config::ServiceConfig;
use crate::context::ContextCarrier;
use crate::http::response::{Envelope, Reply};
use crate::observability::metrics;
use crate::observability::tracing::{pattern_span, record_exception, step_span};

/// The downstream services this orchestrator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downstream {
    ServiceB,
    ServiceC,
}

impl Downstream {
    /// Parse the `{target}` segment of `/api/call/{target}`.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "service-b" | "service_b" => Some(Downstream::ServiceB),
            "service-c" | "service_c" => Some(Downstream::ServiceC),
            _ => None,
        }
    }

    /// Key used for this service in result maps.
    pub fn key(&self) -> &'static str {
        match self {
            Downstream::ServiceB => "service_b",
            Downstream::ServiceC => "service_c",
        }
    }

    /// Name used in human-readable messages.
    pub fn label(&self) -> &'static str {
        match self {
            Downstream::ServiceB => "Service B",
            Downstream::ServiceC => "Service C",
        }
    }
}

/// Named composition of downstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Parallel,
    Sequential,
    PartialFailure,
    CascadeFailure,
    ChainFailure,
    TimeoutFailure,
    Direct,
}

impl Pattern {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Parallel => "parallel",
            Pattern::Sequential => "sequential",
            Pattern::PartialFailure => "partial_failure",
            Pattern::CascadeFailure => "cascade_failure",
            Pattern::ChainFailure => "chain_failure",
            Pattern::TimeoutFailure => "timeout_failure",
            Pattern::Direct => "direct_call",
        }
    }

    /// Name of the span covering the whole pattern.
    pub fn span_name(&self) -> &'static str {
        match self {
            Pattern::Parallel => "parallel_calls",
            Pattern::Sequential => "sequential_calls",
            Pattern::PartialFailure => "partial_failure_scenario",
            Pattern::CascadeFailure => "cascade_failure_scenario",
            Pattern::ChainFailure => "chain_failure_scenario",
            Pattern::TimeoutFailure => "timeout_failure_scenario",
            Pattern::Direct => "direct_call",
        }
    }
}

/// One downstream call within a pattern.
#[derive(Debug, Clone)]
pub struct Step {
    /// Span name of the step, e.g. `call_service_b`.
    pub name: &'static str,
    pub downstream: Downstream,
    /// Fully formed endpoint URL.
    pub target: String,
}

/// Orchestrates downstream calls for the pattern endpoints.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: OutboundClient,
    service_name: String,
    service_b_url: String,
    service_c_url: String,
}

impl Orchestrator {
    pub fn new(
        client: OutboundClient,
        service_name: impl Into<String>,
        service_b_url: impl Into<String>,
        service_c_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            service_name: service_name.into(),
            service_b_url: service_b_url.into(),
            service_c_url: service_c_url.into(),
        }
    }

    /// Build the orchestrator and its outbound client from configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = OutboundClient::new(Duration::from_millis(config.timeouts.call_ms))?;
        Ok(Self::new(
            client,
            config.observability.service_name.clone(),
            config.downstream.service_b_url.clone(),
            config.downstream.service_c_url.clone(),
        ))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Envelope for this service.
    pub fn envelope(
        &self,
        message: impl Into<String>,
        carrier: &ContextCarrier,
        data: Option<Map<String, Value>>,
    ) -> Envelope {
        Envelope::build(&self.service_name, message, carrier, data)
    }

    /// A step calling `path` on `downstream`.
    pub fn step(&self, name: &'static str, downstream: Downstream, path: &str) -> Step {
        let base = match downstream {
            Downstream::ServiceB => &self.service_b_url,
            Downstream::ServiceC => &self.service_c_url,
        };
        Step {
            name,
            downstream,
            target: format!("{}{}", base.trim_end_matches('/'), path),
        }
    }

    /// Call one downstream service directly.
    ///
    /// Success is 200 with the response under the service's key; any
    /// failure is a 502 since this call is the whole request.
    pub async fn direct(&self, carrier: &ContextCarrier, downstream: Downstream) -> Reply {
        self.run_pattern(Pattern::Direct, carrier, move |ctx, span| async move {
            let step = self.step("call_downstream", downstream, "/api/process");
            match self.run_step(&ctx, &step).await {
                Ok(response) => {
                    let mut data = Map::new();
                    data.insert(downstream.key().to_string(), response_value(&response));
                    Reply::ok(self.envelope(
                        format!("Successfully called {}", downstream.label()),
                        carrier,
                        Some(data),
                    ))
                }
                Err(e) => {
                    record_exception(&span, &ctx, &e, e.kind());
                    self.abort(
                        StatusCode::BAD_GATEWAY,
                        format!("Failed to call {}: {}", downstream.label(), e),
                        carrier,
                        downstream.key(),
                        &e,
                    )
                }
            }
        })
        .await
    }

    /// Run `body` inside the pattern's carrier and span, then record the
    /// request metrics.
    async fn run_pattern<F, Fut>(&self, pattern: Pattern, carrier: &ContextCarrier, body: F) -> Reply
    where
        F: FnOnce(ContextCarrier, Span) -> Fut,
        Fut: Future<Output = Reply>,
    {
        let started = Instant::now();
        let span = pattern_span(pattern.span_name(), carrier.correlation_id());
        let ctx = carrier.child_span(pattern.span_name(), &span);

        tracing::info!(
            parent: &span,
            trace.id = %carrier.correlation_id(),
            pattern = pattern.as_str(),
            "Starting {}",
            pattern.span_name()
        );

        let reply = body(ctx, span.clone()).instrument(span.clone()).await;

        tracing::info!(
            parent: &span,
            trace.id = %carrier.correlation_id(),
            status = reply.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{}",
            reply.envelope.message
        );
        metrics::record_request(pattern.as_str(), reply.status.as_u16(), started);

        reply
    }

    /// Issue one step under its own child carrier and span.
    async fn run_step(&self, pattern_ctx: &ContextCarrier, step: &Step) -> CallOutcome {
        let span = step_span(step.name, pattern_ctx.correlation_id());
        let ctx = pattern_ctx.child_span(step.name, &span);
        self.client
            .call(&ctx, Method::GET, &step.target)
            .instrument(span)
            .await
    }

    /// Reply for a failure that ends the request.
    fn abort(
        &self,
        status: StatusCode,
        message: String,
        carrier: &ContextCarrier,
        failed_step: &str,
        error: &CallError,
    ) -> Reply {
        let mut data = Map::new();
        data.insert("failed_step".to_string(), Value::from(failed_step));
        data.insert("error".to_string(), Value::from(error.to_string()));
        data.insert("error_kind".to_string(), Value::from(error.kind().as_str()));
        Reply::new(status, self.envelope(message, carrier, Some(data)))
    }
}

/// JSON form of a downstream response for result maps.
pub(crate) fn response_value(response: &DownstreamResponse) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}
