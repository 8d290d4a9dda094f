//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use trace_orchestrator::config::ServiceConfig;
use trace_orchestrator::http::HttpServer;
use trace_orchestrator::lifecycle::Shutdown;

/// How a mock downstream answers one path.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// 200 with a canonical response body.
    Ok,
    /// The given status with a plain-text body.
    Status(u16),
    /// Sleep, then answer like `Ok`.
    Delay(Duration),
    /// 200 with a body that is not a canonical response.
    Garbage,
}

/// A request seen by a mock downstream.
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub trace_id: Option<String>,
    pub traceparent: Option<String>,
}

struct MockState {
    name: String,
    behaviours: Mutex<HashMap<String, Behaviour>>,
    received: Mutex<Vec<Received>>,
}

/// A programmable downstream service on an ephemeral port.
///
/// Defaults mirror the real downstream services: `/api/process` succeeds,
/// `/api/error` is a 500, `/api/timeout` sleeps for 5s and
/// `/api/call-service-a-error` is a 502.
pub struct MockDownstream {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockDownstream {
    pub async fn start(name: &str) -> Self {
        let mut behaviours = HashMap::new();
        behaviours.insert("/api/process".to_string(), Behaviour::Ok);
        behaviours.insert("/api/error".to_string(), Behaviour::Status(500));
        behaviours.insert(
            "/api/timeout".to_string(),
            Behaviour::Delay(Duration::from_secs(5)),
        );
        behaviours.insert(
            "/api/call-service-a-error".to_string(),
            Behaviour::Status(502),
        );

        let state = Arc::new(MockState {
            name: name.to_string(),
            behaviours: Mutex::new(behaviours),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(mock_handler).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Override how `path` is answered.
    pub fn set(&self, path: &str, behaviour: Behaviour) {
        self.state
            .behaviours
            .lock()
            .unwrap()
            .insert(path.to_string(), behaviour);
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.received().iter().filter(|r| r.path == path).count()
    }
}

async fn mock_handler(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let trace_id = header("x-trace-id");
    state.received.lock().unwrap().push(Received {
        path: uri.path().to_string(),
        trace_id: trace_id.clone(),
        traceparent: header("traceparent"),
    });

    let behaviour = state
        .behaviours
        .lock()
        .unwrap()
        .get(uri.path())
        .cloned()
        .unwrap_or(Behaviour::Status(404));

    let ok = |state: &MockState| {
        Json(json!({
            "service": state.name,
            "message": format!("Request processed by {}", state.name),
            "trace_id": trace_id.clone().unwrap_or_else(|| "unknown".to_string()),
            "timestamp": chrono::Utc::now(),
        }))
        .into_response()
    };

    match behaviour {
        Behaviour::Ok => ok(&state),
        Behaviour::Delay(delay) => {
            tokio::time::sleep(delay).await;
            ok(&state)
        }
        Behaviour::Status(status) => (
            StatusCode::from_u16(status).unwrap(),
            format!("{} failed with {}", state.name, status),
        )
            .into_response(),
        Behaviour::Garbage => (StatusCode::OK, "not json at all").into_response(),
    }
}

/// Default config pointing at the two mocks, with short timeouts.
pub fn test_config(service_b: &MockDownstream, service_c: &MockDownstream) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.downstream.service_b_url = service_b.url();
    config.downstream.service_c_url = service_c.url();
    config.timeouts.call_ms = 1_000;
    config.timeouts.request_ms = 10_000;
    config.process.delay_ms = 10;
    config
}

/// A running instance of the service under test.
pub struct TestService {
    pub base_url: String,
    pub shutdown: Shutdown,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_service(config: ServiceConfig) -> TestService {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestService {
        base_url: format!("http://{}", addr),
        shutdown,
    }
}

/// The mocks plus the service wired to them.
pub async fn start_stack() -> (TestService, MockDownstream, MockDownstream) {
    let service_b = MockDownstream::start("service-b").await;
    let service_c = MockDownstream::start("service-c").await;
    let service = start_service(test_config(&service_b, &service_c)).await;
    (service, service_b, service_c)
}
