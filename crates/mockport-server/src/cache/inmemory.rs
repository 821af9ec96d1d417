use super::{CachedRoute, RouteCache, RouteKey};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory route cache with per-entry expiry.
///
/// Readers take a shared lock; `put` and the invalidation calls take the
/// exclusive lock briefly. Expired entries are ignored on read and purged
/// opportunistically on write.
pub struct InMemoryRouteCache {
    entries: RwLock<HashMap<RouteKey, (CachedRoute, Instant)>>,
    ttl: Duration,
}

impl InMemoryRouteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteCache for InMemoryRouteCache {
    fn get(&self, key: &RouteKey) -> Result<Option<CachedRoute>> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some((route, expires)) if *expires > Instant::now() => Ok(Some(route.clone())),
            _ => Ok(None),
        }
    }

    fn put(&self, key: &RouteKey, route: &CachedRoute) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.clone(), (route.clone(), now + self.ttl));
        Ok(())
    }

    fn invalidate(&self, key: &RouteKey) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn invalidate_project(&self, project_id: &str) -> Result<()> {
        self.entries
            .write()
            .retain(|key, _| key.project_id != project_id);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "inmemory"
    }
}
