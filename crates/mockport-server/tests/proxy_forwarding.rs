//! Integration tests for backend forwarding: fallback, header hygiene,
//! redirects, failures and the AUTO serving mode.

mod common;

use common::{spawn_backend, spawn_tls_backend, start_engine, start_engine_with};
use mockport_server::config::Config;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn proxied_project(backend_url: &str, definitions: Value) -> Value {
    json!({
        "projects": [{
            "id": "p1",
            "shortId": "shop",
            "proxyUrl": backend_url,
            "maintainers": ["u1"],
            "definitions": definitions
        }]
    })
}

// =============================================================================
// Fallback for unmatched routes
// =============================================================================

#[tokio::test]
async fn test_unmatched_route_falls_back_to_backend() {
    let backend = spawn_backend().await;
    let t = start_engine(proxied_project(&backend.url, json!([]))).await;

    let response = t
        .client
        .post(format!("{}?a=1&a=2&b=%20x", t.url("shop", "v1/orders")))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-mockport-proxied"], "true");
    assert_eq!(response.headers()["x-backend"], "echo");
    assert!(response.headers().get("x-mockport-definition").is_none());

    let echo: Value = response.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["path"], "/v1/orders");
    assert_eq!(echo["query"], "a=1&a=2&b=%20x");
    assert_eq!(echo["body"], "payload");
}

#[tokio::test]
async fn test_request_headers_are_cleaned_and_annotated() {
    let backend = spawn_backend().await;
    let t = start_engine(proxied_project(&backend.url, json!([]))).await;

    t.client
        .get(t.url("shop", "inspect"))
        .header("x-trace", "abc")
        .header("proxy-authorization", "Basic c2VjcmV0")
        .header("keep-alive", "timeout=5")
        .header("x-forwarded-for", "10.0.0.1")
        .send()
        .await
        .unwrap();

    let received = backend.wait_for(1).await;
    let headers = &received[0].headers;
    assert_eq!(headers["x-trace"], "abc");
    assert!(headers.get("proxy-authorization").is_none());
    assert!(headers.get("keep-alive").is_none());
    assert_eq!(headers["x-forwarded-for"], "10.0.0.1, 127.0.0.1");
    assert_eq!(headers["x-forwarded-proto"], "http");
    assert!(headers.get("x-forwarded-host").is_some());
}

#[tokio::test]
async fn test_redirects_are_relayed_not_followed() {
    let backend = spawn_backend().await;
    let t = start_engine(proxied_project(&backend.url, json!([]))).await;

    let response = t.client.get(t.url("shop", "redirect")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/elsewhere");
    assert_eq!(backend.received().len(), 1);
}

#[tokio::test]
async fn test_backend_status_is_relayed() {
    let backend = spawn_backend().await;
    let t = start_engine(proxied_project(&backend.url, json!([]))).await;

    let response = t.client.get(t.url("shop", "status/418")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert!(response.headers().get("x-mockport-proxy-error").is_none());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_unreachable_backend_yields_502() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let t = start_engine(proxied_project(&dead, json!([]))).await;

    let response = t.client.get(t.url("shop", "anything")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["x-mockport-proxied"], "true");
    assert_eq!(response.headers()["x-mockport-proxy-error"], "network");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "network");
    assert!(body["target"].as_str().unwrap().ends_with("/anything"));
    assert!(body["hint"].is_string());
}

#[tokio::test]
async fn test_untrusted_backend_certificate_is_reported_as_tls() {
    let backend = spawn_tls_backend().await;
    let t = start_engine(proxied_project(&backend, json!([]))).await;

    let response = t.client.get(t.url("shop", "secure")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["x-mockport-proxy-error"], "tls");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "tls");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("TLS certificate validation failed"));
    assert!(body["hint"].as_str().unwrap().contains("tls_skip_verify"));
}

#[tokio::test]
async fn test_skip_verify_accepts_self_signed_backend() {
    let backend = spawn_tls_backend().await;
    let mut config = Config::default();
    config.proxy.tls_skip_verify = true;
    let t = start_engine_with(proxied_project(&backend, json!([])), config).await;

    let response = t.client.get(t.url("shop", "secure")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

// =============================================================================
// Serving modes
// =============================================================================

#[tokio::test]
async fn test_auto_mode_prefers_rules_then_backend() {
    let backend = spawn_backend().await;
    let t = start_engine(proxied_project(
        &backend.url,
        json!([{
            "id": "d1",
            "path": "/accounts/:id",
            "mode": "AUTO",
            "body": "default",
            "rules": [{
                "id": "vip",
                "conditions": {"conditions": [
                    {"field": "params.id", "operator": "equals", "value": "vip"}
                ]},
                "body": "mocked-vip"
            }]
        }]),
    ))
    .await;

    let response = t.client.get(t.url("shop", "accounts/vip")).send().await.unwrap();
    assert_eq!(response.headers()["x-mockport-rule"], "vip");
    assert_eq!(response.text().await.unwrap(), "mocked-vip");

    let response = t.client.get(t.url("shop", "accounts/7")).send().await.unwrap();
    assert_eq!(response.headers()["x-mockport-proxied"], "true");
    assert_eq!(response.headers()["x-mockport-definition"], "d1");
    let echo: Value = response.json().await.unwrap();
    assert_eq!(echo["path"], "/accounts/7");

    assert_eq!(backend.wait_for(1).await.len(), 1);
}

#[tokio::test]
async fn test_proxy_mode_without_backend_serves_default() {
    let t = start_engine(common::single_project(json!([{
        "id": "d1",
        "path": "/p",
        "mode": "PROXY",
        "statusCode": 202,
        "body": {"fallback": true}
    }])))
    .await;

    let response = t.client.get(t.url("shop", "p")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().get("x-mockport-proxied").is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"fallback": true}));
}

#[tokio::test]
async fn test_proxy_mode_always_forwards() {
    let backend = spawn_backend().await;
    let t = start_engine(proxied_project(
        &backend.url,
        json!([{"id": "d1", "path": "/p", "mode": "PROXY", "body": "never"}]),
    ))
    .await;

    let response = t.client.get(t.url("shop", "p")).send().await.unwrap();
    assert_eq!(response.headers()["x-mockport-proxied"], "true");
    let echo: Value = response.json().await.unwrap();
    assert_eq!(echo["path"], "/p");
}
