//! Response construction helpers for the mock listener.
//!
//! Header names and values used on every response are static so call sites
//! never parse them at runtime.

use super::body::ResponseBody;
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

pub static X_MOCKPORT_DEFINITION: HeaderName = HeaderName::from_static("x-mockport-definition");
pub static X_MOCKPORT_RULE: HeaderName = HeaderName::from_static("x-mockport-rule");
pub static X_MOCKPORT_PROXIED: HeaderName = HeaderName::from_static("x-mockport-proxied");
pub static X_MOCKPORT_PROXY_ERROR: HeaderName = HeaderName::from_static("x-mockport-proxy-error");

pub static ACCESS_CONTROL_ALLOW_ORIGIN: HeaderName =
    HeaderName::from_static("access-control-allow-origin");
pub static ACCESS_CONTROL_ALLOW_METHODS: HeaderName =
    HeaderName::from_static("access-control-allow-methods");
pub static ACCESS_CONTROL_ALLOW_HEADERS: HeaderName =
    HeaderName::from_static("access-control-allow-headers");
pub static ACCESS_CONTROL_EXPOSE_HEADERS: HeaderName =
    HeaderName::from_static("access-control-expose-headers");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");
pub static VALUE_ANY: HeaderValue = HeaderValue::from_static("*");
pub static VALUE_ALLOWED_METHODS: HeaderValue =
    HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS");
pub static VALUE_JSON: HeaderValue = HeaderValue::from_static("application/json");
pub static VALUE_TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Extension trait for inserting Mockport headers into responses.
pub trait MockHeadersExt {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);

    /// Returns false if `value` is not a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;
}

impl<B> MockHeadersExt for Response<B> {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers_mut().insert(name.clone(), value.clone());
    }

    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.headers_mut().insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }
}

/// Permissive CORS headers, present on every mock response.
pub fn apply_cors<B>(response: &mut Response<B>) {
    response.set_header(&ACCESS_CONTROL_ALLOW_ORIGIN, &VALUE_ANY);
    response.set_header(&ACCESS_CONTROL_ALLOW_METHODS, &VALUE_ALLOWED_METHODS);
    response.set_header(&ACCESS_CONTROL_ALLOW_HEADERS, &VALUE_ANY);
    response.set_header(&ACCESS_CONTROL_EXPOSE_HEADERS, &VALUE_ANY);
}

pub fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response<ResponseBody> {
    with_body(status, headers, ResponseBody::new(body))
}

pub fn with_body(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

pub fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    build_response(status, HeaderMap::new(), Bytes::new())
}

pub fn json_response(status: StatusCode, body: &Value) -> Response<ResponseBody> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, VALUE_JSON.clone());
    build_response(status, headers, Bytes::from(body.to_string()))
}

/// Serialize a synthesized body. Strings are sent as-is, `null` as an empty
/// body, everything else as JSON. Returns the default content type to use.
pub fn encode_body(body: &Value) -> (Bytes, Option<&'static HeaderValue>) {
    match body {
        Value::Null => (Bytes::new(), None),
        Value::String(s) => (Bytes::from(s.clone()), Some(&VALUE_TEXT)),
        other => (Bytes::from(other.to_string()), Some(&VALUE_JSON)),
    }
}

/// Convert configured header pairs into a `HeaderMap`, skipping invalid entries.
pub fn header_map(pairs: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping invalid response header '{}'", name),
        }
    }
    headers
}

/// Header pairs as strings, for logs and callback contexts.
pub fn header_strings(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cors_headers() {
        let mut response = empty_response(StatusCode::NO_CONTENT);
        apply_cors(&mut response);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .contains("DELETE"));
        assert!(response.headers().contains_key("access-control-expose-headers"));
    }

    #[test]
    fn test_encode_body() {
        let (bytes, ct) = encode_body(&json!({"a": 1}));
        assert_eq!(&bytes[..], br#"{"a":1}"#);
        assert_eq!(ct, Some(&VALUE_JSON));

        let (bytes, ct) = encode_body(&json!("plain"));
        assert_eq!(&bytes[..], b"plain");
        assert_eq!(ct, Some(&VALUE_TEXT));

        let (bytes, ct) = encode_body(&Value::Null);
        assert!(bytes.is_empty());
        assert!(ct.is_none());
    }

    #[test]
    fn test_header_map_skips_invalid() {
        let pairs = HashMap::from([
            ("X-Ok".to_string(), "yes".to_string()),
            ("bad header".to_string(), "v".to_string()),
        ]);
        let headers = header_map(&pairs);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-ok"], "yes");
    }

    #[test]
    fn test_set_header_value_rejects_invalid() {
        let mut response = empty_response(StatusCode::OK);
        assert!(response.set_header_value(&X_MOCKPORT_RULE, "r1"));
        assert!(!response.set_header_value(&X_MOCKPORT_RULE, "bad\nvalue"));
        assert_eq!(response.headers()["x-mockport-rule"], "r1");
    }
}
