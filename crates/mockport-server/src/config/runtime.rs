//! Runtime tuning for the proxy client, callbacks, broadcasting, the
//! background queue, templating and the in-memory store.

use serde::{Deserialize, Serialize};

/// Outbound client used for proxying to project backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound for the whole upstream exchange, body included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_keepalive_timeout_secs")]
    pub keepalive_timeout_secs: u64,
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
    /// Skip TLS certificate verification (self-signed backends in dev/test).
    #[serde(default)]
    pub tls_skip_verify: bool,
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_keepalive_timeout_secs() -> u64 {
    60
}

fn default_max_idle_per_host() -> usize {
    32
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            keepalive_timeout_secs: default_keepalive_timeout_secs(),
            max_idle_per_host: default_max_idle_per_host(),
            tls_skip_verify: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbacksConfig {
    #[serde(default = "default_callback_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_callback_timeout_secs() -> u64 {
    10
}

impl Default for CallbacksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_callback_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Per-subscriber buffer; a full buffer counts as a failed send.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Post-response work. Call logging and callbacks run on separate lanes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackgroundConfig {
    /// Call logs and their live events.
    #[serde(default)]
    pub events: QueueConfig,
    /// Callback batches; a batch keeps its slot through every `delay_ms`.
    #[serde(default)]
    pub callbacks: QueueConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_queue_size() -> usize {
    1024
}

fn default_max_concurrency() -> usize {
    64
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplatingConfig {
    /// Upper bound for `_repeat_<N>` expansion.
    #[serde(default = "default_max_repeat")]
    pub max_repeat: usize,
}

fn default_max_repeat() -> usize {
    1000
}

impl Default for TemplatingConfig {
    fn default() -> Self {
        Self {
            max_repeat: default_max_repeat(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// YAML or JSON file with projects, definitions, rules and callbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_path: Option<String>,
    /// Number of call and callback records kept in memory.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_log_capacity() -> usize {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fixtures_path: None,
            log_capacity: default_log_capacity(),
        }
    }
}
