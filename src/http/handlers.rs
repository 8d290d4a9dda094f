//! Route handlers.
//!
//! Handlers are thin: they pull the request's [`ContextCarrier`] out of the
//! extensions and hand it explicitly to the orchestrator.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::Extension;

use super::response::Reply;
use super::server::AppState;
use crate::context::ContextCarrier;
use crate::orchestrator::Downstream;

pub async fn health(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    let message = format!("{} is healthy", display_name(state.orchestrator.service_name()));
    Reply::ok(state.orchestrator.envelope(message, &carrier, None))
}

/// Simulated local work. This is what a peer service hits when it calls
/// back into this one.
pub async fn process(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    tokio::time::sleep(Duration::from_millis(state.process_delay_ms)).await;
    tracing::info!(trace.id = %carrier.correlation_id(), "Processed request");

    let message = format!(
        "Request processed by {}",
        display_name(state.orchestrator.service_name())
    );
    Reply::ok(state.orchestrator.envelope(message, &carrier, None))
}

pub async fn parallel(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    state.orchestrator.parallel(&carrier).await
}

pub async fn sequential(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    state.orchestrator.sequential(&carrier).await
}

pub async fn partial_failure(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    state.orchestrator.partial(&carrier).await
}

pub async fn cascade_failure(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    state.orchestrator.cascade(&carrier).await
}

pub async fn chain_failure(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    state.orchestrator.chain(&carrier).await
}

pub async fn timeout_failure(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
) -> Reply {
    state.orchestrator.timeout_scenario(&carrier).await
}

pub async fn call_target(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
    Path(target): Path<String>,
) -> Reply {
    match Downstream::from_slug(&target) {
        Some(downstream) => state.orchestrator.direct(&carrier, downstream).await,
        None => Reply::new(
            StatusCode::NOT_FOUND,
            state
                .orchestrator
                .envelope(format!("Unknown target: {}", target), &carrier, None),
        ),
    }
}

pub async fn not_found(
    State(state): State<AppState>,
    Extension(carrier): Extension<ContextCarrier>,
    uri: Uri,
) -> Reply {
    tracing::debug!(trace.id = %carrier.correlation_id(), path = %uri.path(), "No route matched");
    Reply::new(
        StatusCode::NOT_FOUND,
        state
            .orchestrator
            .envelope(format!("Route not found: {}", uri.path()), &carrier, None),
    )
}

/// `service-a` → `Service A`.
fn display_name(service_name: &str) -> String {
    service_name
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
