//! Request data exposed to rule conditions, templates and callbacks.
//!
//! Field paths are dotted: the first segment selects a namespace, the rest
//! walks nested values.
//!
//! | Namespace              | Source                                        |
//! |------------------------|-----------------------------------------------|
//! | `query`                | query string; repeated keys become arrays     |
//! | `body`                 | parsed JSON, url-encoded form, or raw text    |
//! | `header` / `headers`   | request headers, case-insensitive name        |
//! | `params` / `pathParams`| path parameters from the matched pattern      |
//! | `path`, `method`       | request path and method                       |

use hyper::header::CONTENT_TYPE;
use hyper::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// How a request or response body should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Empty,
    Json,
    Form,
    Multipart,
    Text,
    Binary,
}

impl BodyKind {
    /// Classify from a `content-type` value and the body bytes.
    pub fn classify(content_type: Option<&str>, body: &[u8]) -> Self {
        if body.is_empty() {
            return BodyKind::Empty;
        }
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == "application/json" || mime.ends_with("+json") {
            BodyKind::Json
        } else if mime == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else if mime.starts_with("multipart/") {
            BodyKind::Multipart
        } else if mime.starts_with("text/")
            || mime.ends_with("xml")
            || mime == "application/javascript"
        {
            BodyKind::Text
        } else if mime.is_empty() && std::str::from_utf8(body).is_ok() {
            BodyKind::Text
        } else {
            BodyKind::Binary
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            BodyKind::Json | BodyKind::Form | BodyKind::Text | BodyKind::Empty
        )
    }
}

/// Parsed request data
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP method (uppercase)
    pub method: String,
    /// Request path below the project prefix
    pub path: String,
    pub query: Map<String, Value>,
    /// Header values keyed by lowercase name
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub params: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(
        method: &str,
        path: &str,
        query_string: Option<&str>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Self {
        let headers_map: HashMap<String, String> = headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_ascii_lowercase(), val.to_string()))
            })
            .collect();

        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query: parse_query(query_string),
            headers: headers_map,
            body: parse_body(BodyKind::classify(content_type, body), body),
            params: HashMap::new(),
        }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Resolve a dotted field path. Missing and `null` values yield `None`.
    pub fn resolve(&self, field: &str) -> Option<Value> {
        let mut segments = field.split('.');
        let namespace = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let value = match namespace {
            "query" => walk(&Value::Object(self.query.clone()), &rest),
            "body" => walk(&self.body, &rest),
            "header" | "headers" => match rest.split_first() {
                None => Some(Value::Object(
                    self.headers
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                )),
                Some((name, tail)) => {
                    let value = self.headers.get(&name.to_ascii_lowercase())?;
                    walk(&Value::String(value.clone()), tail)
                }
            },
            "params" | "pathParams" => params_lookup(&self.params, &rest),
            "path" if rest.is_empty() => Some(Value::String(self.path.clone())),
            "path" => params_lookup(&self.params, &rest),
            "method" if rest.is_empty() => Some(Value::String(self.method.clone())),
            _ => None,
        }?;

        (!value.is_null()).then_some(value)
    }

    /// JSON view of the context, used by logs and events.
    pub fn query_as_value(&self) -> Value {
        Value::Object(self.query.clone())
    }
}

fn params_lookup(params: &HashMap<String, String>, rest: &[&str]) -> Option<Value> {
    match rest {
        [] => Some(Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )),
        [name] => params.get(*name).map(|v| Value::String(v.clone())),
        _ => None,
    }
}

/// Walk nested objects/arrays. Numeric segments index arrays.
pub fn walk(root: &Value, segments: &[&str]) -> Option<Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Parse a query (or url-encoded form) string. Repeated keys become arrays.
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();
    let Some(q) = query else {
        return params;
    };

    for pair in q.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = Value::String(decode_component(value));

        match params.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key, value);
            }
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

fn parse_body(kind: BodyKind, body: &[u8]) -> Value {
    match kind {
        BodyKind::Empty | BodyKind::Binary => Value::Null,
        BodyKind::Json => serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
        BodyKind::Form => match std::str::from_utf8(body) {
            Ok(text) => Value::Object(parse_query(Some(text))),
            Err(_) => Value::Null,
        },
        BodyKind::Multipart | BodyKind::Text => match std::str::from_utf8(body) {
            Ok(text) => Value::String(text.to_string()),
            Err(_) => Value::Null,
        },
    }
}
