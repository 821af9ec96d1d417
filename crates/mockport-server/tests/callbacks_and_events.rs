//! Integration tests for side effects: callbacks, call logs, live events and
//! the admin API.

mod common;

use common::{single_project, spawn_backend, start_engine, start_engine_with, wait_until, SseReader};
use mockport_server::config::Config;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// =============================================================================
// Callbacks
// =============================================================================

#[tokio::test]
async fn test_callbacks_run_in_order_with_substitution() {
    let sink = spawn_backend().await;
    let t = start_engine(single_project(json!([{
        "id": "d1",
        "path": "/orders/:id",
        "method": "POST",
        "statusCode": 201,
        "body": {"id": "ord_{{request.params.id}}", "state": "created"},
        "useTemplating": true,
        "callbacks": [
            {
                "id": "second",
                "order": 2,
                "url": format!("{}/hooks/second", sink.url),
                "body": "plain text"
            },
            {
                "id": "first",
                "order": 1,
                "delayMs": 300,
                "url": format!("{}/hooks/{{{{request.params.id}}}}", sink.url),
                "headers": {"x-order-total": "{{request.body.total}}"},
                "body": {
                    "order": "{{response.body.id}}",
                    "status": "{{response.statusCode}}",
                    "note": "total={{request.body.total}}"
                }
            },
            {
                "id": "disabled",
                "order": 0,
                "enabled": false,
                "url": format!("{}/hooks/disabled", sink.url)
            }
        ]
    }])))
    .await;

    let response = t
        .client
        .post(t.url("shop", "orders/42"))
        .json(&json!({"total": 99.5}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let received = sink.wait_for(2).await;
    assert_eq!(received[0].path, "/hooks/42");
    assert_eq!(received[1].path, "/hooks/second");
    assert!(received[0].at <= received[1].at);

    let first = &received[0];
    assert_eq!(first.method, "POST");
    assert_eq!(first.headers["x-order-total"], "99.5");
    assert_eq!(first.headers["content-type"], "application/json");
    assert_eq!(
        first.json(),
        json!({"order": "ord_42", "status": 201, "note": "total=99.5"})
    );
    assert_eq!(received[1].body, "plain text");

    // Logs land after the invocations; poll for both.
    let logs_url = t.admin("/admin/callbacks/logs?definitionId=d1");
    let client = t.client.clone();
    let mut logs = Value::Null;
    for _ in 0..100 {
        logs = client.get(&logs_url).send().await.unwrap().json().await.unwrap();
        if logs["logs"].as_array().map_or(0, Vec::len) >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let logs = logs["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l["success"] == true));
    assert!(logs.iter().all(|l| l["responseStatus"] == 200));
    assert!(sink.received().iter().all(|r| r.path != "/hooks/disabled"));
}

#[tokio::test]
async fn test_failed_callback_does_not_stop_the_batch() {
    let sink = spawn_backend().await;
    let t = start_engine(single_project(json!([{
        "id": "d1",
        "path": "/x",
        "callbacks": [
            {"id": "bad", "order": 1, "url": "not a url"},
            {"id": "server-error", "order": 2, "url": format!("{}/status/500", sink.url)},
            {"id": "good", "order": 3, "url": format!("{}/ok", sink.url)}
        ]
    }])))
    .await;

    t.client.get(t.url("shop", "x")).send().await.unwrap();

    let received = sink.wait_for(2).await;
    assert_eq!(received[1].path, "/ok");

    let store = t.store().clone();
    wait_until(move || store.recent_callback_logs(Some("d1"), 10).len() == 3).await;
    let logs = t.store().recent_callback_logs(Some("d1"), 10);
    let by_id = |id: &str| logs.iter().find(|l| l.callback_id == id).unwrap().clone();

    let bad = by_id("bad");
    assert!(!bad.success);
    assert!(bad.error.is_some());
    assert!(bad.response_status.is_none());

    let server_error = by_id("server-error");
    assert!(!server_error.success);
    assert_eq!(server_error.response_status, Some(500));

    assert!(by_id("good").success);
}

fn large_body_project(sink_url: &str) -> Value {
    single_project(json!([{
        "id": "d1",
        "path": "/big",
        "body": "x".repeat(16 * 1024 * 1024),
        "callbacks": [{"id": "hook", "url": format!("{sink_url}/hook")}]
    }]))
}

async fn request_without_reading(t: &common::TestEngine, extra_headers: &str) -> TcpStream {
    let addr = t.mock_url.trim_start_matches("http://");
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET /mock/shop/big HTTP/1.1\r\nHost: mock\r\n{extra_headers}\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

#[tokio::test]
async fn test_callbacks_wait_until_the_response_is_read() {
    let sink = spawn_backend().await;
    let t = start_engine(large_body_project(&sink.url)).await;

    let mut stream = request_without_reading(&t, "Connection: close\r\n").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(sink.received().is_empty());

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(response.len() > 16 * 1024 * 1024);
    assert!(response.starts_with(b"HTTP/1.1 200"));

    let received = sink.wait_for(1).await;
    assert_eq!(received[0].path, "/hook");
}

#[tokio::test]
async fn test_abandoned_response_sends_no_callbacks() {
    let sink = spawn_backend().await;
    let t = start_engine(large_body_project(&sink.url)).await;

    let stream = request_without_reading(&t, "").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(sink.received().is_empty());

    // The call itself is still logged.
    let store = t.store().clone();
    wait_until(move || store.recent_calls(Some("p1"), 10).len() == 1).await;

    drop(stream);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(sink.received().is_empty());
    assert!(t.store().recent_callback_logs(Some("d1"), 10).is_empty());
}

#[tokio::test]
async fn test_no_content_response_still_sends_callbacks() {
    let sink = spawn_backend().await;
    let t = start_engine(single_project(json!([{
        "id": "d1",
        "path": "/gone",
        "method": "DELETE",
        "statusCode": 204,
        "body": {"ignored": true},
        "callbacks": [{"id": "hook", "url": format!("{}/hook", sink.url)}]
    }])))
    .await;

    let response = t.client.delete(t.url("shop", "gone")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let received = sink.wait_for(1).await;
    assert_eq!(received[0].path, "/hook");
}

#[tokio::test]
async fn test_slow_callbacks_do_not_hold_up_call_logs() {
    let sink = spawn_backend().await;
    let mut config = Config::default();
    config.background.callbacks.max_concurrency = 1;
    let t = start_engine_with(
        single_project(json!([{
            "id": "d1",
            "path": "/x",
            "callbacks": [{"id": "slow", "delayMs": 5000, "url": format!("{}/hook", sink.url)}]
        }])),
        config,
    )
    .await;

    for _ in 0..4 {
        let response = t.client.get(t.url("shop", "x")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let store = t.store().clone();
    tokio::time::timeout(
        Duration::from_secs(2),
        wait_until(move || store.recent_calls(Some("p1"), 10).len() == 4),
    )
    .await
    .expect("call logs held up behind callbacks");
    assert!(sink.received().is_empty());
}

// =============================================================================
// Live events
// =============================================================================

#[tokio::test]
async fn test_event_stream_is_scoped_to_project() {
    let t = start_engine(json!({
        "projects": [
            {"id": "p1", "shortId": "one", "definitions": [{"id": "d1", "path": "/a", "body": "a"}]},
            {"id": "p2", "shortId": "two", "definitions": [{"id": "d2", "path": "/b", "body": "b"}]}
        ]
    }))
    .await;

    let response = t
        .client
        .get(t.admin("/events?projectId=p1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let mut events = SseReader::new(response);

    let (kind, payload) = events.next_event().await;
    assert_eq!(kind, "connected");
    assert!(payload["data"]["clientId"].is_string());

    t.client.get(t.url("two", "b")).send().await.unwrap();
    t.client.get(t.url("one", "a")).send().await.unwrap();

    let (kind, payload) = events.next_event().await;
    assert_eq!(kind, "call");
    assert_eq!(payload["projectId"], "p1");
    assert_eq!(payload["definitionId"], "d1");
    assert_eq!(payload["data"]["path"], "a");
    assert_eq!(payload["data"]["statusCode"], 200);
}

#[tokio::test]
async fn test_proxy_failure_notifies_maintainers() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let t = start_engine(json!({
        "projects": [{
            "id": "p1",
            "shortId": "shop",
            "proxyUrl": dead,
            "maintainers": ["u1"],
            "definitions": []
        }]
    }))
    .await;

    let response = t.client.get(t.admin("/events?userId=u1")).send().await.unwrap();
    let mut events = SseReader::new(response);
    assert_eq!(events.next_event().await.0, "connected");

    t.client.get(t.url("shop", "down")).send().await.unwrap();

    let (kind, payload) = events.next_event().await;
    assert_eq!(kind, "notification");
    assert_eq!(payload["data"]["error"]["kind"], "network");
}

#[tokio::test]
async fn test_bad_event_query_is_rejected() {
    let t = start_engine(single_project(json!([]))).await;
    let response = t
        .client
        .get(t.admin("/events?projectId=p1&projectId=p2"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Admin API
// =============================================================================

#[tokio::test]
async fn test_health_and_metrics() {
    let t = start_engine(single_project(json!([{"id": "d1", "path": "/x"}]))).await;
    t.client.get(t.url("shop", "x")).send().await.unwrap();

    let health: Value = t
        .client
        .get(t.admin("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["routeCache"], "inmemory");

    let metrics = t
        .client
        .get(t.admin("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("mockport_mock_requests_total"));

    let response = t.client.get(t.admin("/nope")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_call_log_records_request() {
    let t = start_engine(single_project(json!([{"id": "d1", "path": "/x", "body": {"ok": 1}}]))).await;

    t.client
        .get(format!("{}?page=2", t.url("shop", "x")))
        .header("user-agent", "integration")
        .send()
        .await
        .unwrap();

    let store = t.store().clone();
    wait_until(move || !store.recent_calls(Some("p1"), 10).is_empty()).await;

    let calls: Value = t
        .client
        .get(t.admin("/admin/calls?projectId=p1&limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let call = &calls["calls"][0];
    assert_eq!(call["definitionId"], "d1");
    assert_eq!(call["method"], "GET");
    assert_eq!(call["query"]["page"], "2");
    assert_eq!(call["userAgent"], "integration");
    assert_eq!(call["proxied"], false);
    assert_eq!(call["responseBody"], r#"{"ok":1}"#);

    // Unparseable limits fall back to the default.
    let calls: Value = t
        .client
        .get(t.admin("/admin/calls?limit=lots"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(calls["calls"].as_array().unwrap().len(), 1);

    let response = t
        .client
        .get(t.admin("/admin/calls?projectId=a&projectId=b"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cache_invalidate_endpoint() {
    let t = start_engine(single_project(json!([{"id": "d1", "path": "/x"}]))).await;
    t.client.get(t.url("shop", "x")).send().await.unwrap();

    let response = t
        .client
        .post(t.admin("/admin/cache/invalidate"))
        .json(&json!({"projectId": "p1", "path": "/x", "method": "GET"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .client
        .post(t.admin("/admin/cache/invalidate"))
        .json(&json!({"projectId": "p1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["invalidated"], "project p1");

    let response = t
        .client
        .post(t.admin("/admin/cache/invalidate"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Still served after invalidation.
    let response = t.client.get(t.url("shop", "x")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reload_replaces_definitions() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let initial = single_project(json!([{"id": "d1", "path": "/old", "body": "old"}]));
    write!(file, "{initial}").unwrap();

    let mut config = Config::default();
    config.store.fixtures_path = Some(file.path().display().to_string());
    let t = start_engine_with(initial, config).await;

    let response = t.client.get(t.url("shop", "old")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let replacement = single_project(json!([{"id": "d2", "path": "/new", "body": "new"}]));
    std::fs::write(file.path(), replacement.to_string()).unwrap();

    let response = t.client.post(t.admin("/admin/reload")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["projects"], 1);

    let response = t.client.get(t.url("shop", "old")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = t.client.get(t.url("shop", "new")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "new");
}

#[tokio::test]
async fn test_reload_without_fixtures_file() {
    let t = start_engine(single_project(json!([]))).await;
    let response = t.client.post(t.admin("/admin/reload")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
