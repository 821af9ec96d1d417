//! Route-match cache.
//!
//! Successful route matches are cached under `(project, normalized path,
//! method)` with a short TTL. The configuration layer keeps the cache honest
//! through [`RouteInvalidator`]: every definition create/update/delete or
//! enabled flip must invalidate the affected key (or the whole project for
//! parameterized paths, whose concrete keys are unknown).
//!
//! The trait is synchronous, like the stores it abstracts: the in-memory
//! backend never blocks and the Redis backend uses a pooled blocking client.

mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use inmemory::InMemoryRouteCache;
#[cfg(feature = "redis-backend")]
pub use redis::RedisRouteCache;

use crate::config::CacheConfig;
use crate::matcher::normalize_path;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Cache key: project id, normalized path, uppercase method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub project_id: String,
    pub path: String,
    pub method: String,
}

impl RouteKey {
    pub fn new(project_id: &str, path: &str, method: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            path: normalize_path(path),
            method: method.to_ascii_uppercase(),
        }
    }

    /// Flat string form used by external backends.
    pub fn storage_key(&self) -> String {
        format!("route:{}:{}:{}", self.project_id, self.method, self.path)
    }
}

/// What a cache hit yields: enough to re-load the definition and skip matching.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRoute {
    pub definition_id: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Backend-agnostic route cache.
pub trait RouteCache: Send + Sync {
    fn get(&self, key: &RouteKey) -> Result<Option<CachedRoute>>;

    fn put(&self, key: &RouteKey, route: &CachedRoute) -> Result<()>;

    /// Drop a single key.
    fn invalidate(&self, key: &RouteKey) -> Result<()>;

    /// Drop every key belonging to a project.
    fn invalidate_project(&self, project_id: &str) -> Result<()>;

    /// Short backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Cache that never stores anything (TTL of zero or `backend: none`).
#[derive(Debug)]
pub struct NoOpRouteCache;

impl RouteCache for NoOpRouteCache {
    fn get(&self, _key: &RouteKey) -> Result<Option<CachedRoute>> {
        Ok(None)
    }

    fn put(&self, _key: &RouteKey, _route: &CachedRoute) -> Result<()> {
        Ok(())
    }

    fn invalidate(&self, _key: &RouteKey) -> Result<()> {
        Ok(())
    }

    fn invalidate_project(&self, _project_id: &str) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}

/// Invalidation hook the configuration layer calls after mutating definitions.
pub trait RouteInvalidator: Send + Sync {
    fn invalidate_route(&self, project_id: &str, path: &str, method: &str);

    fn invalidate_project(&self, project_id: &str);
}

/// [`RouteInvalidator`] backed by a [`RouteCache`]. Backend errors are logged,
/// the entry then simply ages out through its TTL.
pub struct CacheInvalidator {
    cache: Arc<dyn RouteCache>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn RouteCache>) -> Self {
        Self { cache }
    }
}

impl RouteInvalidator for CacheInvalidator {
    fn invalidate_route(&self, project_id: &str, path: &str, method: &str) {
        let key = RouteKey::new(project_id, path, method);
        if let Err(e) = self.cache.invalidate(&key) {
            warn!(
                "Route cache invalidation failed for {}: {:#}",
                key.storage_key(),
                e
            );
        }
    }

    fn invalidate_project(&self, project_id: &str) {
        if let Err(e) = self.cache.invalidate_project(project_id) {
            warn!(
                "Route cache invalidation failed for project {}: {:#}",
                project_id, e
            );
        }
    }
}

/// Create a route cache from configuration.
pub fn create_route_cache(config: &CacheConfig) -> Result<Arc<dyn RouteCache>> {
    if config.ttl_seconds == 0 {
        tracing::info!("Route cache disabled (ttl_seconds = 0)");
        return Ok(Arc::new(NoOpRouteCache));
    }

    match config.backend.as_str() {
        "none" => Ok(Arc::new(NoOpRouteCache)),
        "inmemory" => {
            tracing::info!("Using in-memory route cache (ttl={}s)", config.ttl_seconds);
            Ok(Arc::new(InMemoryRouteCache::new(Duration::from_secs(
                config.ttl_seconds,
            ))))
        }
        "redis" => {
            let redis_config = config
                .redis
                .as_ref()
                .ok_or_else(|| anyhow!("Redis cache backend selected but no redis config provided"))?;

            #[cfg(feature = "redis-backend")]
            {
                use anyhow::Context;

                let cache = RedisRouteCache::new(
                    &redis_config.url,
                    redis_config.pool_size,
                    redis_config.key_prefix.clone(),
                    config.ttl_seconds,
                )
                .context("Failed to create Redis route cache")?;
                tracing::info!(
                    "Using redis route cache (url={}, ttl={}s)",
                    redis_config.url,
                    config.ttl_seconds
                );
                Ok(Arc::new(cache))
            }

            #[cfg(not(feature = "redis-backend"))]
            {
                let _ = redis_config;
                Err(anyhow!(
                    "Redis cache backend not available. Compile with --features redis-backend"
                ))
            }
        }
        other => Err(anyhow!("Unknown route cache backend: {other}")),
    }
}
