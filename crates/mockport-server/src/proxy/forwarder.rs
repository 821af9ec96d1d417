//! Backend forwarding.

use super::client::{create_http_client, HttpClient};
use super::error::ProxyError;
use super::headers::{forward_request_headers, strip_hop_by_hop};
use super::tls::{chain_to_string, find_certificate_error};
use crate::config::ProxyConfig;
use crate::metrics;
use crate::rules::BodyKind;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Request, StatusCode, Uri};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The inbound request as seen by the forwarder.
#[derive(Debug, Clone)]
pub struct ProxyRequest<'a> {
    pub method: &'a Method,
    /// Path below the project prefix
    pub path: &'a str,
    /// Raw query string, re-appended verbatim
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: Bytes,
    pub client_ip: &'a str,
    /// `http` or `https`
    pub protocol: &'a str,
}

/// Result of a forward. Failures still carry a (synthesized 502) response;
/// `error` tells the caller what went wrong.
#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub target_url: String,
    pub error: Option<ProxyError>,
    pub latency: Duration,
}

impl ProxyOutcome {
    fn failed(target_url: String, error: ProxyError, latency: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status: StatusCode::BAD_GATEWAY,
            headers,
            body: Bytes::from(error.to_json().to_string()),
            target_url,
            error: Some(error),
            latency,
        }
    }
}

pub struct ProxyForwarder {
    client: HttpClient,
    request_timeout: Duration,
}

impl ProxyForwarder {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            client: create_http_client(config),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// `base` (trailing slash trimmed) + `/` + `path` + `?query`.
    pub fn build_target_url(base_url: &str, path: &str, query: Option<&str>) -> String {
        let base = base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let mut url = if path.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{path}")
        };
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    pub async fn forward(&self, base_url: &str, request: ProxyRequest<'_>) -> ProxyOutcome {
        let start = Instant::now();
        let target_url = Self::build_target_url(base_url, request.path, request.query);

        let outcome = match self.exchange(&target_url, request).await {
            Ok((status, headers, body)) => {
                debug!("Proxied to {} -> {}", target_url, status);
                ProxyOutcome {
                    status,
                    headers,
                    body,
                    target_url,
                    error: None,
                    latency: start.elapsed(),
                }
            }
            Err(error) => {
                warn!("Proxy failure: {}", error);
                ProxyOutcome::failed(target_url, error, start.elapsed())
            }
        };

        let label = outcome.error.as_ref().map_or("success", ProxyError::kind);
        metrics::record_proxy_request(label, outcome.latency.as_secs_f64() * 1000.0);
        outcome
    }

    async fn exchange(
        &self,
        target_url: &str,
        request: ProxyRequest<'_>,
    ) -> Result<(StatusCode, HeaderMap, Bytes), ProxyError> {
        let uri: Uri = target_url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            ProxyError::InvalidTarget {
                url: target_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(uri.scheme_str(), Some("http") | Some("https")) || uri.host().is_none() {
            return Err(ProxyError::InvalidTarget {
                url: target_url.to_string(),
                reason: "expected an absolute http or https URL".to_string(),
            });
        }

        let content_type = request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let body_kind = BodyKind::classify(content_type, &request.body);
        let body = if carries_body(request.method) {
            debug!(
                "Forwarding {:?} body ({} bytes) to {}",
                body_kind,
                request.body.len(),
                target_url
            );
            request.body
        } else {
            Bytes::new()
        };

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = forward_request_headers(request.headers, request.client_ip, request.protocol);
        }
        let outbound = builder
            .body(Full::new(body))
            .map_err(|e| ProxyError::InvalidTarget {
                url: target_url.to_string(),
                reason: e.to_string(),
            })?;

        let exchange = async {
            let response = self
                .client
                .request(outbound)
                .await
                .map_err(|e| classify_request_error(target_url, &e))?;
            let (parts, body) = response.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| ProxyError::ResponseBody {
                    url: target_url.to_string(),
                    detail: chain_to_string(&e),
                })?
                .to_bytes();
            Ok::<_, ProxyError>((parts.status, strip_hop_by_hop(&parts.headers), bytes))
        };

        tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| ProxyError::Timeout {
                url: target_url.to_string(),
                timeout_secs: self.request_timeout.as_secs(),
            })?
    }
}

fn carries_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn classify_request_error(
    target_url: &str,
    err: &hyper_util::client::legacy::Error,
) -> ProxyError {
    if let Some(detail) = find_certificate_error(err) {
        return ProxyError::TlsValidation {
            url: target_url.to_string(),
            detail,
        };
    }
    ProxyError::Network {
        url: target_url.to_string(),
        detail: chain_to_string(err),
    }
}
