//! Outbound HTTP side effect fired after a mock response is served.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Callback {
    pub id: String,
    #[serde(default)]
    pub definition_id: String,
    /// Invocation order within the definition's batch.
    #[serde(default)]
    pub order: i32,
    /// Target URL; may contain `{{request.*}}` / `{{response.*}}` tokens.
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_enabled() -> bool {
    true
}
