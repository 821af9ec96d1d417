//! Shared helpers: an in-process engine on ephemeral ports and a hyper
//! backend that records what it receives.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use mockport_server::admin_api::AdminApiServer;
use mockport_server::config::Config;
use mockport_server::proxy::install_crypto_provider;
use mockport_server::store::{Fixtures, InMemoryStore};
use mockport_server::{MockEngine, MockServer};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestEngine {
    pub engine: Arc<MockEngine>,
    pub mock_url: String,
    pub admin_url: String,
    pub client: reqwest::Client,
}

impl TestEngine {
    /// `{mock_url}/mock/{short_id}/{path}`
    pub fn url(&self, short_id: &str, path: &str) -> String {
        format!("{}/mock/{}/{}", self.mock_url, short_id, path.trim_start_matches('/'))
    }

    pub fn admin(&self, path: &str) -> String {
        format!("{}{}", self.admin_url, path)
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        self.engine.store()
    }
}

pub async fn start_engine(fixtures: Value) -> TestEngine {
    start_engine_with(fixtures, Config::default()).await
}

pub async fn start_engine_with(fixtures: Value, config: Config) -> TestEngine {
    install_crypto_provider();

    let fixtures = Fixtures::parse(&fixtures.to_string()).expect("fixtures parse");
    let store = InMemoryStore::from_fixtures(fixtures, 1000).expect("fixtures load");
    let engine = Arc::new(MockEngine::new(config, Arc::new(store)).expect("engine"));
    engine.start();

    let mock_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mock_url = format!("http://{}", mock_listener.local_addr().unwrap());
    let admin_url = format!("http://{}", admin_listener.local_addr().unwrap());

    let mock_server = MockServer::new(Arc::clone(&engine)).unwrap();
    tokio::spawn(mock_server.serve(mock_listener));
    tokio::spawn(AdminApiServer::new(Arc::clone(&engine)).serve(admin_listener));

    TestEngine {
        engine,
        mock_url,
        admin_url,
        client: reqwest::Client::builder()
            .timeout(TEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap(),
    }
}

/// One project `p1` / `shop` with the given definitions.
pub fn single_project(definitions: Value) -> Value {
    json!({
        "projects": [{
            "id": "p1",
            "shortId": "shop",
            "maintainers": ["u1"],
            "definitions": definitions
        }]
    })
}

#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub at: Instant,
}

impl Received {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// Backend and callback sink.
///
/// - `/redirect` answers 302 with `location: /elsewhere`
/// - `/status/{code}` answers with that status
/// - anything else echoes the request as JSON
pub struct Backend {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Backend {
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }

    pub async fn wait_for(&self, count: usize) -> Vec<Received> {
        let received = self.received.clone();
        wait_until(move || received.lock().len() >= count).await;
        self.received()
    }
}

pub async fn spawn_backend() -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let received: Arc<Mutex<Vec<Received>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = received.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let sink = sink.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let sink = sink.clone();
                    async move { backend_handler(req, sink).await }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    Backend { url, received }
}

async fn backend_handler(
    req: Request<Incoming>,
    sink: Arc<Mutex<Vec<Received>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
    let record = Received {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers.clone(),
        body: body.clone(),
        at: Instant::now(),
    };
    sink.lock().push(record);

    let path = parts.uri.path();
    if path == "/redirect" {
        return Ok(Response::builder()
            .status(StatusCode::FOUND)
            .header("location", "/elsewhere")
            .body(Full::new(Bytes::new()))
            .unwrap());
    }
    if let Some(code) = path.strip_prefix("/status/") {
        let status = code.parse::<u16>().unwrap_or(500);
        return Ok(Response::builder()
            .status(status)
            .body(Full::new(Bytes::from("status")))
            .unwrap());
    }

    let echo = json!({
        "method": parts.method.as_str(),
        "path": path,
        "query": parts.uri.query(),
        "body": String::from_utf8_lossy(&body),
    });
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .header("x-backend", "echo")
        .body(Full::new(Bytes::from(echo.to_string())))
        .unwrap())
}

/// HTTPS backend with a freshly generated self-signed certificate for
/// `localhost`/`127.0.0.1`. Accepts handshakes and answers `200 ok`.
pub async fn spawn_tls_backend() -> String {
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

    install_crypto_provider();
    let certified =
        rcgen::generate_simple_self_signed(["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let cert = CertificateDer::from(certified.cert.der().to_vec());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.signing_key.serialize_der()));
    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(tls_config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("https://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(stream) = acceptor.accept(stream).await else {
                    return;
                };
                let service = service_fn(|_req: Request<Incoming>| async {
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from("ok"))))
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    url
}

/// Poll until `condition` holds or the test timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {TEST_TIMEOUT:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Reads `event:`/`data:` frames from a streaming SSE response.
pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Next event as `(kind, payload)`, skipping heartbeats.
    pub async fn next_event(&mut self) -> (String, Value) {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                let mut kind = String::new();
                let mut data = Value::Null;
                for line in frame.lines() {
                    if let Some(k) = line.strip_prefix("event: ") {
                        kind = k.to_string();
                    } else if let Some(d) = line.strip_prefix("data: ") {
                        data = serde_json::from_str(d).unwrap();
                    }
                }
                if kind == "heartbeat" {
                    continue;
                }
                return (kind, data);
            }
            let chunk = tokio::time::timeout(TEST_TIMEOUT, self.response.chunk())
                .await
                .expect("timed out waiting for event")
                .expect("stream error")
                .expect("stream ended");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}
