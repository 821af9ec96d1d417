use super::substitution::{ResponseContext, Substitution};
use crate::broadcast::EventRecorder;
use crate::config::CallbacksConfig;
use crate::metrics;
use crate::model::{Callback, CallbackLogRecord, Project};
use crate::rules::RequestContext;
use crate::store::ConfigStore;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Error types for callback invocation
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The callback could not be turned into a request (bad URL, method, header).
    #[error("Invalid callback request: {0}")]
    Build(String),

    /// The HTTP request failed (network, DNS, timeout, etc.).
    #[error("Callback request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Fires a definition's callbacks after its response is produced.
pub struct CallbackDispatcher {
    store: Arc<dyn ConfigStore>,
    recorder: Arc<EventRecorder>,
    client: reqwest::Client,
}

struct Prepared {
    method: reqwest::Method,
    url: String,
    headers: HeaderMap,
    body: Option<String>,
}

impl CallbackDispatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        recorder: Arc<EventRecorder>,
        config: &CallbacksConfig,
    ) -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            store,
            recorder,
            client,
        })
    }

    /// Invoke the enabled callbacks one after another, in `order`. A failing
    /// callback is logged and does not stop the rest. Nothing is retried.
    pub async fn dispatch(
        &self,
        project: &Project,
        definition_id: &str,
        request: &RequestContext,
        response: &ResponseContext,
    ) -> Vec<CallbackLogRecord> {
        let callbacks = match self.store.callbacks(definition_id).await {
            Ok(callbacks) => ordered_callbacks(callbacks),
            Err(e) => {
                warn!("Failed to load callbacks for definition {}: {}", definition_id, e);
                return Vec::new();
            }
        };
        if callbacks.is_empty() {
            return Vec::new();
        }

        debug!(
            "Dispatching {} callback(s) for definition {}",
            callbacks.len(),
            definition_id
        );
        let substitution = Substitution::new(request, response);
        let mut records = Vec::with_capacity(callbacks.len());

        for callback in &callbacks {
            if callback.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(callback.delay_ms)).await;
            }
            let record = self.invoke(project, callback, &substitution).await;
            self.recorder
                .record_callback(record.clone(), project.maintainers.clone())
                .await;
            records.push(record);
        }
        records
    }

    async fn invoke(
        &self,
        project: &Project,
        callback: &Callback,
        substitution: &Substitution<'_>,
    ) -> CallbackLogRecord {
        let start = Instant::now();
        let mut record = CallbackLogRecord {
            id: uuid::Uuid::new_v4().to_string(),
            callback_id: callback.id.clone(),
            definition_id: callback.definition_id.clone(),
            project_id: project.id.clone(),
            url: substitution.render_str(&callback.url),
            method: callback.method.to_ascii_uppercase(),
            request_headers: HashMap::new(),
            request_body: None,
            response_status: None,
            response_body: None,
            success: false,
            latency_ms: 0,
            error: None,
            timestamp: Utc::now(),
        };

        let prepared = match prepare(callback, substitution) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Callback {} skipped: {}", callback.id, e);
                metrics::record_callback("error");
                record.error = Some(e.to_string());
                return record;
            }
        };
        record.request_headers = header_map_to_strings(&prepared.headers);
        record.request_body = prepared.body.clone();

        let mut builder = self
            .client
            .request(prepared.method, prepared.url.as_str())
            .headers(prepared.headers);
        if let Some(body) = prepared.body {
            builder = builder.body(body);
        }

        let result: Result<(u16, String), CallbackError> = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok((status, text))
        }
        .await;
        record.latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((status, text)) => {
                record.response_status = Some(status);
                record.response_body = (!text.is_empty()).then_some(text);
                record.success = (200..300).contains(&status);
                if record.success {
                    info!("Callback {} -> {} {}", callback.id, record.url, status);
                    metrics::record_callback("success");
                } else {
                    warn!("Callback {} -> {} returned HTTP {}", callback.id, record.url, status);
                    record.error = Some(format!("Callback returned HTTP {status}"));
                    metrics::record_callback("failure");
                }
            }
            Err(e) => {
                warn!("Callback {} -> {} failed: {}", callback.id, record.url, e);
                record.error = Some(e.to_string());
                metrics::record_callback("error");
            }
        }
        record
    }
}

/// Enabled callbacks by ascending `order`; equal orders keep declaration order.
pub fn ordered_callbacks(callbacks: Vec<Callback>) -> Vec<Callback> {
    let mut enabled: Vec<Callback> = callbacks.into_iter().filter(|c| c.enabled).collect();
    enabled.sort_by_key(|c| c.order);
    enabled
}

fn prepare(callback: &Callback, substitution: &Substitution<'_>) -> Result<Prepared, CallbackError> {
    let method = reqwest::Method::from_bytes(callback.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CallbackError::Build(format!("invalid method '{}'", callback.method)))?;

    let url = substitution.render_str(&callback.url);
    reqwest::Url::parse(&url).map_err(|e| CallbackError::Build(format!("invalid url '{url}': {e}")))?;

    let mut headers = HeaderMap::new();
    for (name, value) in &callback.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| CallbackError::Build(format!("invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(&substitution.render_str(value))
            .map_err(|_| CallbackError::Build(format!("invalid value for header '{name}'")))?;
        headers.insert(name, value);
    }

    let body = match &callback.body {
        Value::Null => None,
        Value::String(s) => Some(substitution.render_str(s)),
        template => {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Some(substitution.render_value(template).to_string())
        }
    };

    Ok(Prepared {
        method,
        url,
        headers,
        body,
    })
}

fn header_map_to_strings(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::HeaderMap as HyperHeaderMap;
    use serde_json::json;

    fn callback(value: Value) -> Callback {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ordering_and_filtering() {
        let ordered = ordered_callbacks(vec![
            callback(json!({"id": "c", "order": 3, "url": "http://x"})),
            callback(json!({"id": "a", "order": 1, "url": "http://x"})),
            callback(json!({"id": "off", "order": 0, "url": "http://x", "enabled": false})),
            callback(json!({"id": "b", "order": 1, "url": "http://x"})),
        ]);
        let ids: Vec<&str> = ordered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    fn contexts() -> (RequestContext, ResponseContext) {
        let request = RequestContext::new("GET", "/users/1", Some("ref=abc"), &HyperHeaderMap::new(), b"");
        let response = ResponseContext {
            status_code: 200,
            headers: HashMap::new(),
            body: json!({"id": 1}),
        };
        (request, response)
    }

    #[test]
    fn test_prepare_renders_everything() {
        let (req, resp) = contexts();
        let sub = Substitution::new(&req, &resp);
        let cb = callback(json!({
            "id": "c1",
            "url": "http://hooks.local/{{request.query.ref}}",
            "method": "put",
            "headers": {"x-ref": "{{request.query.ref}}"},
            "body": {"userId": "{{response.body.id}}"}
        }));
        let prepared = prepare(&cb, &sub).unwrap();
        assert_eq!(prepared.method, reqwest::Method::PUT);
        assert_eq!(prepared.url, "http://hooks.local/abc");
        assert_eq!(prepared.headers.get("x-ref").unwrap(), "abc");
        assert_eq!(prepared.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        let body: Value = serde_json::from_str(prepared.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"userId": 1}));
    }

    #[test]
    fn test_prepare_string_body_is_raw() {
        let (req, resp) = contexts();
        let sub = Substitution::new(&req, &resp);
        let cb = callback(json!({"id": "c1", "url": "http://h", "body": "ref={{request.query.ref}}"}));
        let prepared = prepare(&cb, &sub).unwrap();
        assert_eq!(prepared.body.as_deref(), Some("ref=abc"));
        assert!(prepared.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_prepare_rejects_bad_url() {
        let (req, resp) = contexts();
        let sub = Substitution::new(&req, &resp);
        let cb = callback(json!({"id": "c1", "url": "{{request.query.missing}}"}));
        assert!(matches!(prepare(&cb, &sub), Err(CallbackError::Build(_))));
    }

    #[test]
    fn test_callback_error_display() {
        let err = CallbackError::Build("invalid method 'FOO BAR'".to_string());
        assert_eq!(err.to_string(), "Invalid callback request: invalid method 'FOO BAR'");
    }
}
