//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, correlation)
//! - Bind server to listener
//! - Stop accepting and drain on shutdown

use axum::http::StatusCode;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::request::correlate;
use crate::orchestrator::Orchestrator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub process_delay_ms: u64,
}

/// HTTP server for the orchestrating service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, reqwest::Error> {
        let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

        let state = AppState {
            orchestrator,
            process_delay_ms: config.process.delay_ms,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: access log, correlation, request timeout. The
    /// correlation layer sits outside the timeout so a 408 still carries
    /// `X-Trace-ID`.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/process", get(handlers::process))
            .route("/api/parallel", get(handlers::parallel))
            .route("/api/sequential", get(handlers::sequential))
            .route("/api/failure/partial", get(handlers::partial_failure))
            .route("/api/failure/cascade", get(handlers::cascade_failure))
            .route("/api/failure/chain", get(handlers::chain_failure))
            .route("/api/failure/timeout", get(handlers::timeout_failure))
            .route("/api/call/{target}", get(handlers::call_target))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(correlate))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        Duration::from_millis(config.timeouts.request_ms),
                    )),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.observability.service_name,
            service_b = %self.config.downstream.service_b_url,
            service_c = %self.config.downstream.service_c_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
