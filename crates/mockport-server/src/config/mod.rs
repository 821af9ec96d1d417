//! Configuration types for the Mockport engine.

mod cache;
mod listen;
mod runtime;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use cache::{CacheConfig, RedisConfig};
pub use listen::{AdminConfig, ListenConfig, Protocol, TlsConfig};
pub use runtime::{
    BackgroundConfig, BroadcastConfig, CallbacksConfig, ProxyConfig, QueueConfig, StoreConfig,
    TemplatingConfig,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Mock traffic listener (`/mock/{shortId}/...`).
    #[serde(default)]
    pub listen: ListenConfig,
    /// Admin API listener (health, metrics, events, cache hooks).
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub callbacks: CallbacksConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub templating: TemplatingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.protocol == Protocol::Https && self.listen.tls.is_none() {
            anyhow::bail!(
                "TLS configuration is required when listener protocol is 'https'. \
                 Please provide 'listen.tls.cert_path' and 'listen.tls.key_path'"
            );
        }

        if self.listen.port != 0 && self.listen.port == self.admin.port {
            anyhow::bail!(
                "Mock listener and admin API cannot share port {}",
                self.listen.port
            );
        }

        match self.cache.backend.as_str() {
            "inmemory" | "none" => {}
            "redis" => {
                if self.cache.redis.is_none() {
                    anyhow::bail!("cache.backend is 'redis' but no 'cache.redis' section is set");
                }
            }
            other => anyhow::bail!(
                "Unsupported cache backend: '{other}'. Supported: inmemory, redis, none"
            ),
        }

        if self.broadcast.heartbeat_interval_secs == 0 {
            anyhow::bail!("broadcast.heartbeat_interval_secs must be greater than zero");
        }
        if self.broadcast.channel_capacity == 0 {
            anyhow::bail!("broadcast.channel_capacity must be greater than zero");
        }
        for (lane, queue) in [
            ("events", &self.background.events),
            ("callbacks", &self.background.callbacks),
        ] {
            if queue.queue_size == 0 || queue.max_concurrency == 0 {
                anyhow::bail!(
                    "background.{lane}.queue_size and background.{lane}.max_concurrency must be greater than zero"
                );
            }
        }
        if self.proxy.request_timeout_secs == 0 {
            anyhow::bail!("proxy.request_timeout_secs must be greater than zero");
        }

        Ok(())
    }
}
