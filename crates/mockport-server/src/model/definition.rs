//! Mock definition: one configured endpoint and its default response.

use crate::matcher::{is_pattern_segment, normalize_path};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// How a matched definition produces its response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServingMode {
    /// Rules, then the static default response.
    #[default]
    Mock,
    /// Rules, then the project backend, then the static default response.
    Auto,
    /// Always forward to the project backend.
    Proxy,
}

impl ServingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServingMode::Mock => "MOCK",
            ServingMode::Auto => "AUTO",
            ServingMode::Proxy => "PROXY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDefinition {
    pub id: String,
    /// Filled in from the enclosing project when loaded from fixtures.
    #[serde(default)]
    pub project_id: String,
    /// Literal segments, `:name` parameters and `*` wildcards.
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: ServingMode,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub use_templating: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_status_code() -> u16 {
    200
}

impl MockDefinition {
    /// The path with leading/trailing slashes stripped and empty segments collapsed.
    pub fn normalized_path(&self) -> String {
        normalize_path(&self.path)
    }

    /// True when the path contains a `:param` or `*` segment.
    pub fn is_pattern(&self) -> bool {
        self.path.split('/').any(is_pattern_segment)
    }

    pub fn method_matches(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }
}
