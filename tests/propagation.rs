//! Correlation identifier and traceparent propagation across hops.

use std::collections::HashSet;

use serde_json::Value;

mod common;

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

fn header(response: &reqwest::Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_minted_id_matches_header_and_body() {
    let (service, _b, _c) = common::start_stack().await;

    let response = reqwest::get(service.url("/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let trace_id = header(&response, "x-trace-id");
    let body: Value = response.json().await.unwrap();

    assert!(trace_id.starts_with("trace-"), "minted id: {}", trace_id);
    assert_eq!(body["trace_id"], trace_id.as_str());
    assert_eq!(body["service"], "service-a");
    assert_eq!(body["message"], "Service A is healthy");
}

#[tokio::test]
async fn test_inbound_id_passes_through_to_every_hop() {
    let (service, b, c) = common::start_stack().await;
    let client = reqwest::Client::new();

    let response = client
        .get(service.url("/api/parallel"))
        .header("X-Trace-ID", "client-abc-123")
        .send()
        .await
        .unwrap();

    assert_eq!(header(&response, "x-trace-id"), "client-abc-123");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["trace_id"], "client-abc-123");
    assert_eq!(body["data"]["service_b"]["trace_id"], "client-abc-123");
    assert_eq!(body["data"]["service_c"]["trace_id"], "client-abc-123");

    for received in b.received().iter().chain(c.received().iter()) {
        assert_eq!(received.trace_id.as_deref(), Some("client-abc-123"));
    }
}

#[tokio::test]
async fn test_amzn_header_is_accepted() {
    let (service, b, _c) = common::start_stack().await;
    let client = reqwest::Client::new();

    let response = client
        .get(service.url("/api/call/service-b"))
        .header("X-Amzn-Trace-Id", "Root=1-abc")
        .send()
        .await
        .unwrap();

    assert_eq!(header(&response, "x-trace-id"), "Root=1-abc");
    assert_eq!(b.received()[0].trace_id.as_deref(), Some("Root=1-abc"));
}

#[tokio::test]
async fn test_traceparent_is_continued_downstream() {
    let (service, b, c) = common::start_stack().await;
    let client = reqwest::Client::new();

    let response = client
        .get(service.url("/api/sequential"))
        .header("traceparent", TRACEPARENT)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let received: Vec<_> = b.received().into_iter().chain(c.received()).collect();
    assert_eq!(received.len(), 2);
    for r in &received {
        let traceparent = r.traceparent.as_deref().unwrap();
        let fields: Vec<&str> = traceparent.split('-').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1], "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_ne!(fields[2], "00f067aa0ba902b7");
        assert_eq!(fields[3], "01");
    }
}

#[tokio::test]
async fn test_missing_traceparent_starts_one_trace_per_request() {
    let (service, b, c) = common::start_stack().await;

    let response = reqwest::get(service.url("/api/parallel")).await.unwrap();
    assert_eq!(response.status(), 200);

    let trace_ids: HashSet<String> = b
        .received()
        .into_iter()
        .chain(c.received())
        .map(|r| r.traceparent.unwrap().split('-').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(trace_ids.len(), 1);
}

#[tokio::test]
async fn test_invalid_traceparent_is_tolerated() {
    let (service, b, _c) = common::start_stack().await;
    let client = reqwest::Client::new();

    let response = client
        .get(service.url("/api/call/service-b"))
        .header("traceparent", "00-00000000000000000000000000000000-00f067aa0ba902b7-01")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let forwarded = b.received()[0].traceparent.clone().unwrap();
    assert!(!forwarded.contains("00000000000000000000000000000000"));
}

#[tokio::test]
async fn test_unknown_route_is_stamped() {
    let (service, _b, _c) = common::start_stack().await;
    let client = reqwest::Client::new();

    let response = client
        .get(service.url("/no/such/route"))
        .header("X-Trace-ID", "lost-42")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(header(&response, "x-trace-id"), "lost-42");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["trace_id"], "lost-42");
}

#[tokio::test]
async fn test_concurrent_requests_do_not_cross_talk() {
    let (service, _b, _c) = common::start_stack().await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let url = service.url("/api/parallel");
        handles.push(tokio::spawn(async move {
            let id = format!("req-{}", i);
            let response = client
                .get(url)
                .header("X-Trace-ID", &id)
                .send()
                .await
                .unwrap();
            let echoed = header(&response, "x-trace-id");
            let body: Value = response.json().await.unwrap();
            (id, echoed, body)
        }));
    }

    for handle in handles {
        let (id, echoed, body) = handle.await.unwrap();
        assert_eq!(echoed, id);
        assert_eq!(body["trace_id"], id.as_str());
        assert_eq!(body["data"]["service_b"]["trace_id"], id.as_str());
        assert_eq!(body["data"]["service_c"]["trace_id"], id.as_str());
    }
}
