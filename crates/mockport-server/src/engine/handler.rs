//! Request flow for `/mock/{shortId}/{...path}`.
//!
//! Matcher, then rules / static default / proxy, then synthesis and delay.
//! Once the response is decided, logging and broadcast are handed to the
//! background queue. Callbacks are queued only after the response body has
//! been written out to the client.

use super::body::{Delivered, ResponseBody};
use super::response::{
    apply_cors, empty_response, encode_body, header_map, header_strings, json_response, with_body,
    MockHeadersExt, VALUE_TRUE, X_MOCKPORT_DEFINITION, X_MOCKPORT_PROXIED, X_MOCKPORT_PROXY_ERROR,
    X_MOCKPORT_RULE,
};
use super::MockEngine;
use crate::broadcast::{BroadcastEvent, EventKind};
use crate::callbacks::ResponseContext;
use crate::error::EngineError;
use crate::metrics;
use crate::model::{CallLogRecord, MockDefinition, Project, Rule, ServingMode, SERVED_METHODS};
use crate::proxy::{ProxyError, ProxyRequest};
use crate::rules::{stringify, BodyKind, RequestContext};
use crate::template::{apply_delay, resolve_delay};
use base64::Engine as _;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{CONTENT_TYPE, USER_AGENT};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const MOCK_PREFIX: &str = "/mock/";

/// Split `/mock/{shortId}/{rest}` into `(shortId, rest)`.
///
/// ```
/// use mockport_server::engine::parse_mock_path;
///
/// assert_eq!(parse_mock_path("/mock/shop/users/1"), Some(("shop", "users/1")));
/// assert_eq!(parse_mock_path("/mock/shop"), Some(("shop", "")));
/// assert_eq!(parse_mock_path("/other/shop"), None);
/// ```
pub fn parse_mock_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(MOCK_PREFIX)?;
    let (short_id, rest) = rest.split_once('/').unwrap_or((rest, ""));
    if short_id.is_empty() {
        return None;
    }
    Some((short_id, rest))
}

/// The parts of the inbound request that outlive body collection.
struct Inbound {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    client_ip: String,
}

struct ProxyInfo {
    target_url: String,
    error: Option<ProxyError>,
}

/// A decided response plus what produced it.
struct Served {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    definition: Option<MockDefinition>,
    rule_id: Option<String>,
    proxy: Option<ProxyInfo>,
}

impl Served {
    fn source(&self) -> &'static str {
        if self.proxy.is_some() {
            "proxy"
        } else if self.rule_id.is_some() {
            "rule"
        } else {
            "mock"
        }
    }
}

impl MockEngine {
    /// Serve one request on the mock listener. Never fails: errors become
    /// JSON responses. Every response carries CORS headers.
    pub async fn handle<B>(&self, req: Request<B>, client_addr: SocketAddr) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let start = Instant::now();
        let method = req.method().clone();

        let mut response = if method == Method::OPTIONS {
            empty_response(StatusCode::NO_CONTENT)
        } else {
            match self.serve(req, client_addr, start).await {
                Ok(response) => response,
                Err(e) => {
                    if matches!(e, EngineError::Store(_)) {
                        warn!("Mock request failed: {}", e);
                    } else {
                        debug!("Mock request rejected: {}", e);
                    }
                    let status = e.status();
                    metrics::record_mock_request(
                        method.as_str(),
                        "error",
                        status.as_u16(),
                        start.elapsed().as_secs_f64() * 1000.0,
                    );
                    json_response(status, &e.to_json())
                }
            }
        };
        apply_cors(&mut response);
        response
    }

    async fn serve<B>(
        &self,
        req: Request<B>,
        client_addr: SocketAddr,
        start: Instant,
    ) -> Result<Response<ResponseBody>, EngineError>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let method = req.method().clone();
        if !SERVED_METHODS.contains(&method.as_str()) {
            return Err(EngineError::MethodNotAllowed(method.to_string()));
        }

        let uri_path = req.uri().path().to_string();
        let (short_id, path) = parse_mock_path(&uri_path).ok_or_else(|| EngineError::NoRoute {
            method: method.to_string(),
            path: uri_path.trim_start_matches('/').to_string(),
        })?;

        let project = self
            .store_view()
            .project_by_short_id(short_id)
            .await?
            .ok_or_else(|| EngineError::ProjectNotFound(short_id.to_string()))?;
        if !project.is_active() {
            return Err(EngineError::ProjectInactive(short_id.to_string()));
        }

        let query = req.uri().query().map(str::to_string);
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                Bytes::new()
            }
        };
        let inbound = Inbound {
            method,
            path: path.to_string(),
            query,
            headers: parts.headers,
            body,
            client_ip: client_addr.ip().to_string(),
        };

        let mut ctx = RequestContext::new(
            inbound.method.as_str(),
            &inbound.path,
            inbound.query.as_deref(),
            &inbound.headers,
            &inbound.body,
        );

        let route = self
            .matcher
            .match_route(&project.id, &inbound.path, inbound.method.as_str())
            .await?;

        let served = match route {
            Some(route) => {
                ctx = ctx.with_params(route.params);
                self.serve_definition(&project, route.definition, &ctx, &inbound)
                    .await
            }
            None => match project.proxy_base() {
                Some(base) => {
                    debug!("No route for /{}, proxying to {}", inbound.path, base);
                    self.respond_proxy(&project, None, base, &inbound).await
                }
                None => {
                    return Err(EngineError::NoRoute {
                        method: inbound.method.to_string(),
                        path: inbound.path.clone(),
                    })
                }
            },
        };

        Ok(self.finish(project, inbound, ctx, served, start))
    }

    async fn serve_definition(
        &self,
        project: &Project,
        definition: MockDefinition,
        ctx: &RequestContext,
        inbound: &Inbound,
    ) -> Served {
        match definition.mode {
            ServingMode::Mock => {
                let rule = self.pick_rule(&definition, ctx).await;
                self.respond_mock(definition, rule, ctx).await
            }
            ServingMode::Auto => {
                let rule = self.pick_rule(&definition, ctx).await;
                match (rule, project.proxy_base()) {
                    (Some(rule), _) => self.respond_mock(definition, Some(rule), ctx).await,
                    (None, Some(base)) => {
                        self.respond_proxy(project, Some(definition), base, inbound)
                            .await
                    }
                    (None, None) => self.respond_mock(definition, None, ctx).await,
                }
            }
            ServingMode::Proxy => match project.proxy_base() {
                Some(base) => {
                    self.respond_proxy(project, Some(definition), base, inbound)
                        .await
                }
                None => {
                    warn!(
                        "Definition {} is in proxy mode but project {} has no backend; serving default response",
                        definition.id, project.short_id
                    );
                    self.respond_mock(definition, None, ctx).await
                }
            },
        }
    }

    async fn pick_rule(&self, definition: &MockDefinition, ctx: &RequestContext) -> Option<Rule> {
        match self.rules.select_rule(&definition.id, ctx).await {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Failed to load rules for definition {}: {}", definition.id, e);
                None
            }
        }
    }

    async fn respond_mock(
        &self,
        definition: MockDefinition,
        rule: Option<Rule>,
        ctx: &RequestContext,
    ) -> Served {
        let status_code = rule
            .as_ref()
            .and_then(|r| r.status_code)
            .unwrap_or(definition.status_code);
        let status = StatusCode::from_u16(status_code).unwrap_or_else(|_| {
            warn!(
                "Invalid status code {} on definition {}, using 200",
                status_code, definition.id
            );
            StatusCode::OK
        });

        let mut header_pairs = definition.headers.clone();
        if let Some(overrides) = rule.as_ref().and_then(|r| r.headers.as_ref()) {
            header_pairs.extend(overrides.clone());
        }
        if definition.use_templating {
            for value in header_pairs.values_mut() {
                *value = stringify(&self.synthesizer.render_string(value, Some(ctx)));
            }
        }

        let template = rule
            .as_ref()
            .and_then(|r| r.body.as_ref())
            .unwrap_or(&definition.body);
        let body = self
            .synthesizer
            .synthesize(template, definition.use_templating, Some(ctx));

        let mut headers = header_map(&header_pairs);
        let (bytes, content_type) = encode_body(&body);
        if let Some(content_type) = content_type {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, content_type.clone());
            }
        }

        let delay = resolve_delay(rule.as_ref().and_then(|r| r.delay_ms), definition.delay_ms);
        apply_delay(delay).await;

        Served {
            status,
            headers,
            body: bytes,
            definition: Some(definition),
            rule_id: rule.map(|r| r.id),
            proxy: None,
        }
    }

    async fn respond_proxy(
        &self,
        project: &Project,
        definition: Option<MockDefinition>,
        base_url: &str,
        inbound: &Inbound,
    ) -> Served {
        let outcome = self
            .forwarder
            .forward(
                base_url,
                ProxyRequest {
                    method: &inbound.method,
                    path: &inbound.path,
                    query: inbound.query.as_deref(),
                    headers: &inbound.headers,
                    body: inbound.body.clone(),
                    client_ip: &inbound.client_ip,
                    protocol: self.config.listen.protocol.as_str(),
                },
            )
            .await;

        if let Some(error) = &outcome.error {
            self.recorder
                .notify(proxy_failure_event(project, definition.as_ref(), error));
        }

        Served {
            status: outcome.status,
            headers: outcome.headers,
            body: outcome.body,
            definition,
            rule_id: None,
            proxy: Some(ProxyInfo {
                target_url: outcome.target_url,
                error: outcome.error,
            }),
        }
    }

    /// Build the final response and queue the side effects.
    fn finish(
        &self,
        project: Project,
        inbound: Inbound,
        ctx: RequestContext,
        served: Served,
        start: Instant,
    ) -> Response<ResponseBody> {
        let source = served.source();
        let latency = start.elapsed();
        let Served {
            status,
            headers,
            body,
            definition,
            rule_id,
            proxy,
        } = served;

        let record = CallLogRecord {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            definition_id: definition.as_ref().map(|d| d.id.clone()),
            rule_id: rule_id.clone(),
            method: inbound.method.to_string(),
            path: inbound.path.clone(),
            query: ctx.query.clone(),
            request_headers: header_strings(&inbound.headers),
            request_body: log_body(&inbound.headers, &inbound.body),
            status_code: status.as_u16(),
            response_headers: header_strings(&headers),
            response_body: log_body(&headers, &body),
            latency_ms: latency.as_millis() as u64,
            proxied: proxy.is_some(),
            proxy_target: proxy.as_ref().map(|p| p.target_url.clone()),
            proxy_error: proxy
                .as_ref()
                .and_then(|p| p.error.as_ref())
                .map(ToString::to_string),
            client_ip: inbound.client_ip.clone(),
            user_agent: inbound
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            timestamp: Utc::now(),
        };

        let response_ctx = ResponseContext {
            status_code: status.as_u16(),
            headers: header_strings(&headers),
            body: response_value(&body),
        };
        let (body, delivered) = if carries_payload(&inbound.method, status) {
            ResponseBody::with_delivery(body)
        } else {
            ResponseBody::without_payload(body)
        };
        self.submit_side_effects(&project, record, definition.as_ref(), ctx, response_ctx, delivered);

        let mut response = with_body(status, headers, body);
        if let Some(definition) = &definition {
            response.set_header_value(&X_MOCKPORT_DEFINITION, &definition.id);
        }
        if let Some(rule_id) = &rule_id {
            response.set_header_value(&X_MOCKPORT_RULE, rule_id);
        }
        if let Some(proxy) = &proxy {
            response.set_header(&X_MOCKPORT_PROXIED, &VALUE_TRUE);
            if let Some(error) = &proxy.error {
                response.set_header_value(&X_MOCKPORT_PROXY_ERROR, error.kind());
            }
        }

        metrics::record_mock_request(
            inbound.method.as_str(),
            source,
            status.as_u16(),
            latency.as_secs_f64() * 1000.0,
        );
        debug!(
            "{} /mock/{}/{} -> {} via {} in {:?}",
            inbound.method, project.short_id, inbound.path, status, source, latency
        );
        response
    }

    fn submit_side_effects(
        &self,
        project: &Project,
        record: CallLogRecord,
        definition: Option<&MockDefinition>,
        ctx: RequestContext,
        response_ctx: ResponseContext,
        delivered: Delivered,
    ) {
        let recorder = Arc::clone(&self.recorder);
        let audience = project.maintainers.clone();
        // Failures are already counted by the queue.
        let _ = self.queue.submit("call-log", async move {
            recorder.record_call(record, audience).await;
        });

        let Some(definition) = definition else {
            return;
        };
        let queue = Arc::clone(&self.callback_queue);
        let dispatcher = Arc::clone(&self.dispatcher);
        let project = project.clone();
        let definition_id = definition.id.clone();
        tokio::spawn(async move {
            if delivered.await.is_err() {
                debug!(
                    "Response for definition {} was not delivered, skipping callbacks",
                    definition_id
                );
                return;
            }
            let _ = queue.submit("callbacks", async move {
                dispatcher
                    .dispatch(&project, &definition_id, &ctx, &response_ctx)
                    .await;
            });
        });
    }

    fn store_view(&self) -> &dyn crate::store::ConfigStore {
        self.store.as_ref()
    }
}

fn proxy_failure_event(
    project: &Project,
    definition: Option<&MockDefinition>,
    error: &ProxyError,
) -> BroadcastEvent {
    BroadcastEvent::new(EventKind::Notification)
        .with_project(project.id.clone())
        .with_definition(definition.map(|d| d.id.clone()))
        .with_audience(project.maintainers.clone())
        .with_data(json!({
            "title": "Proxy request failed",
            "projectShortId": project.short_id,
            "error": error.to_json(),
        }))
}

/// Whether hyper writes the body for this exchange.
fn carries_payload(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

/// Bodies for call logs: text as-is, binary as base64, empty as `None`.
fn log_body(headers: &HeaderMap, body: &Bytes) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if BodyKind::classify(content_type, body).is_textual() {
        Some(String::from_utf8_lossy(body).into_owned())
    } else {
        Some(base64::engine::general_purpose::STANDARD.encode(body))
    }
}

fn response_value(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
