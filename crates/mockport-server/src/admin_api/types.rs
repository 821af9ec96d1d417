//! Request/response types and helpers for the Admin API.

use crate::rules::parse_query;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;

/// Body type of every admin response; the event stream needs a streaming body.
pub type AdminBody = UnsyncBoxBody<Bytes, Infallible>;

pub const DEFAULT_LOG_LIMIT: usize = 50;
pub const MAX_LOG_LIMIT: usize = 1000;

/// `POST /admin/cache/invalidate` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    pub project_id: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

/// Query parameters of the log endpoints.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub definition_id: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl LogQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .min(MAX_LOG_LIMIT)
    }
}

/// Deserialize a query string into `T`. Repeated keys are rejected.
pub fn parse_query_params<T: serde::de::DeserializeOwned>(query: Option<&str>) -> Result<T, String> {
    serde_json::from_value(Value::Object(parse_query(query)))
        .map_err(|e| format!("Invalid query parameters: {e}"))
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Box a fixed body into [`AdminBody`].
pub trait ResponseExt {
    fn into_boxed(self) -> Response<AdminBody>;
}

impl ResponseExt for Response<Full<Bytes>> {
    fn into_boxed(self) -> Response<AdminBody> {
        self.map(|b| b.boxed_unsync())
    }
}

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with headers.
///
/// Falls back to a bare 500 when the builder rejects the inputs.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|_| {
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorResponse {
            error: message.to_string(),
        },
    )
}

pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_query_limit() {
        let q: LogQuery = parse_query_params(Some("projectId=p1&limit=5")).unwrap();
        assert_eq!(q.project_id.as_deref(), Some("p1"));
        assert_eq!(q.limit(), 5);

        let q: LogQuery = parse_query_params(Some("limit=abc")).unwrap();
        assert_eq!(q.limit(), DEFAULT_LOG_LIMIT);

        let q: LogQuery = parse_query_params(Some("limit=999999")).unwrap();
        assert_eq!(q.limit(), MAX_LOG_LIMIT);

        let q: LogQuery = parse_query_params(None).unwrap();
        assert_eq!(q, LogQuery::default());
    }

    #[test]
    fn test_repeated_key_rejected() {
        let result: Result<LogQuery, _> = parse_query_params(Some("projectId=a&projectId=b"));
        assert!(result.is_err());
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(StatusCode::BAD_REQUEST, "nope");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
