//! Route matcher: `(project, path, method)` to at most one mock definition.
//!
//! Lookup order:
//! 1. route cache (hit re-loads the definition by id; stale entries are dropped)
//! 2. exact match on the normalized path among enabled definitions
//! 3. first structurally matching parameterized definition, in declaration order
//!
//! Successful matches from steps 2 and 3 are written back to the cache.

mod path;

pub use path::{is_pattern_segment, match_pattern, normalize_path};

use crate::cache::{CachedRoute, RouteCache, RouteKey};
use crate::metrics;
use crate::model::MockDefinition;
use crate::store::{ConfigStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A resolved route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub definition: MockDefinition,
    pub params: HashMap<String, String>,
}

pub struct RouteMatcher {
    store: Arc<dyn ConfigStore>,
    cache: Arc<dyn RouteCache>,
}

impl RouteMatcher {
    pub fn new(store: Arc<dyn ConfigStore>, cache: Arc<dyn RouteCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<dyn RouteCache> {
        &self.cache
    }

    /// Resolve a request to a definition. `Ok(None)` means no route.
    pub async fn match_route(
        &self,
        project_id: &str,
        path: &str,
        method: &str,
    ) -> Result<Option<RouteMatch>, StoreError> {
        let key = RouteKey::new(project_id, path, method);

        if let Some(hit) = self.cached(&key).await? {
            return Ok(Some(hit));
        }

        let definitions = self.store.definitions(project_id, &key.method).await?;
        let Some(found) = find_route(&definitions, &key.path) else {
            debug!(
                "No route for {} /{} in project {}",
                key.method, key.path, project_id
            );
            return Ok(None);
        };

        let entry = CachedRoute {
            definition_id: found.definition.id.clone(),
            params: found.params.clone(),
        };
        if let Err(e) = self.cache.put(&key, &entry) {
            warn!("Route cache write failed for {}: {}", key.storage_key(), e);
        }

        Ok(Some(found))
    }

    async fn cached(&self, key: &RouteKey) -> Result<Option<RouteMatch>, StoreError> {
        let backend = self.cache.backend_name();
        let entry = match self.cache.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                metrics::record_route_cache(backend, "miss");
                return Ok(None);
            }
            Err(e) => {
                warn!("Route cache read failed for {}: {}", key.storage_key(), e);
                metrics::record_route_cache(backend, "error");
                return Ok(None);
            }
        };

        match self.store.definition(&entry.definition_id).await? {
            Some(definition)
                if definition.enabled
                    && definition.project_id == key.project_id
                    && definition.method_matches(&key.method) =>
            {
                metrics::record_route_cache(backend, "hit");
                Ok(Some(RouteMatch {
                    definition,
                    params: entry.params,
                }))
            }
            _ => {
                debug!("Dropping stale route cache entry {}", key.storage_key());
                metrics::record_route_cache(backend, "stale");
                if let Err(e) = self.cache.invalidate(key) {
                    warn!("Route cache invalidation failed: {}", e);
                }
                Ok(None)
            }
        }
    }
}

/// Pure matching over a method-filtered definition list (declaration order).
pub fn find_route(definitions: &[MockDefinition], normalized_path: &str) -> Option<RouteMatch> {
    let exact = definitions
        .iter()
        .find(|d| d.enabled && !d.is_pattern() && d.normalized_path() == normalized_path);
    if let Some(definition) = exact {
        return Some(RouteMatch {
            definition: definition.clone(),
            params: HashMap::new(),
        });
    }

    // No specificity ranking: the first declared structural match wins.
    definitions
        .iter()
        .filter(|d| d.enabled && d.is_pattern())
        .find_map(|d| {
            match_pattern(&d.normalized_path(), normalized_path).map(|params| RouteMatch {
                definition: d.clone(),
                params,
            })
        })
}
