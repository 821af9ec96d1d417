//! `{{request.*}}` / `{{response.*}}` substitution for callback templates.

use crate::rules::{stringify, walk, RequestContext};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*((?:request|response)(?:\.[A-Za-z0-9_\-]+)+)\s*\}\}").unwrap()
    })
}

/// The response that was served, as seen by callbacks.
#[derive(Debug, Clone, Default)]
pub struct ResponseContext {
    pub status_code: u16,
    /// Header values keyed by lowercase name
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl ResponseContext {
    pub fn resolve(&self, field: &str) -> Option<Value> {
        let mut segments = field.split('.');
        let namespace = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let value = match namespace {
            "statusCode" | "status" if rest.is_empty() => Some(Value::from(self.status_code)),
            "body" => walk(&self.body, &rest),
            "header" | "headers" => {
                let (name, tail) = rest.split_first()?;
                let value = self.headers.get(&name.to_ascii_lowercase())?;
                walk(&Value::String(value.clone()), tail)
            }
            _ => None,
        }?;
        (!value.is_null()).then_some(value)
    }
}

/// Both sides of the exchange a callback may reference.
#[derive(Debug, Clone, Copy)]
pub struct Substitution<'a> {
    pub request: &'a RequestContext,
    pub response: &'a ResponseContext,
}

impl<'a> Substitution<'a> {
    pub fn new(request: &'a RequestContext, response: &'a ResponseContext) -> Self {
        Self { request, response }
    }

    fn lookup(&self, token: &str) -> Option<Value> {
        let (side, field) = token.split_once('.')?;
        match side {
            "request" => self.request.resolve(field),
            "response" => self.response.resolve(field),
            _ => None,
        }
    }

    /// Replace tokens inside a string; unresolved tokens stay as written.
    pub fn render_str(&self, template: &str) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        token_regex()
            .replace_all(template, |caps: &regex::Captures| {
                self.lookup(&caps[1])
                    .map(|v| stringify(&v))
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Walk a JSON template. A string that is exactly one token takes the
    /// resolved value with its type.
    pub fn render_value(&self, template: &Value) -> Value {
        match template {
            Value::String(s) => {
                let trimmed = s.trim();
                if let Some(caps) = token_regex().captures(trimmed) {
                    if caps.get(0).map(|m| m.as_str().len()) == Some(trimmed.len()) {
                        if let Some(value) = self.lookup(&caps[1]) {
                            return value;
                        }
                    }
                }
                Value::String(self.render_str(s))
            }
            Value::Array(items) => Value::Array(items.iter().map(|i| self.render_value(i)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
