use super::{CachedRoute, RouteCache, RouteKey};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use redis::{Commands, Connection};

/// Connection manager handing out mutex-wrapped blocking connections.
struct RedisConnectionManager {
    client: redis::Client,
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = Mutex<Connection>;
    type Error = redis::RedisError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.client.get_connection()?;
        Ok(Mutex::new(conn))
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        redis::cmd("PING").query(conn.get_mut())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Redis route cache shared by every engine instance pointed at the same server.
///
/// Entries are stored as JSON under `{prefix}route:{project}:{method}:{path}`
/// with `SETEX`, so Redis enforces the TTL. Project-wide invalidation scans
/// the project's key prefix.
pub struct RedisRouteCache {
    pool: r2d2::Pool<RedisConnectionManager>,
    key_prefix: String,
    ttl_seconds: u64,
}

impl RedisRouteCache {
    /// Connect and verify the server answers `PING`.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g. "redis://localhost:6379")
    /// * `pool_size` - Connection pool size
    /// * `key_prefix` - Prefix for all keys (e.g. "mockport:")
    /// * `ttl_seconds` - Entry lifetime
    pub fn new(url: &str, pool_size: usize, key_prefix: String, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(url).context("Failed to parse Redis URL")?;

        let pool = r2d2::Pool::builder()
            .max_size(pool_size as u32)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(RedisConnectionManager { client })
            .context("Failed to create Redis connection pool")?;

        {
            let conn = pool.get().context("Failed to get connection from pool")?;
            let _: String = redis::cmd("PING")
                .query(&mut *conn.lock())
                .context("Failed to PING Redis")?;
        }

        tracing::info!(
            "Connected to Redis route cache with prefix={}, ttl={}s, pool_size={}",
            key_prefix,
            ttl_seconds,
            pool_size
        );

        Ok(Self {
            pool,
            key_prefix,
            ttl_seconds,
        })
    }

    fn make_key(&self, key: &RouteKey) -> String {
        format!("{}{}", self.key_prefix, key.storage_key())
    }
}

impl RouteCache for RedisRouteCache {
    fn get(&self, key: &RouteKey) -> Result<Option<CachedRoute>> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;

        let value: Option<String> = conn
            .lock()
            .get(self.make_key(key))
            .context("Redis GET failed")?;

        match value {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to parse cached route")?,
            )),
            None => Ok(None),
        }
    }

    fn put(&self, key: &RouteKey, route: &CachedRoute) -> Result<()> {
        let json = serde_json::to_string(route).context("Failed to serialize cached route")?;
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;

        let _: () = redis::cmd("SETEX")
            .arg(self.make_key(key))
            .arg(self.ttl_seconds)
            .arg(json)
            .query(&mut *conn.lock())
            .context("Redis SETEX failed")?;
        Ok(())
    }

    fn invalidate(&self, key: &RouteKey) -> Result<()> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;

        let _: () = conn
            .lock()
            .del(self.make_key(key))
            .context("Redis DEL failed")?;
        Ok(())
    }

    fn invalidate_project(&self, project_id: &str) -> Result<()> {
        let pattern = format!("{}route:{}:*", self.key_prefix, project_id);
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;
        let mut guard = conn.lock();

        let keys: Vec<String> = guard
            .scan_match::<_, String>(&pattern)
            .context("Redis SCAN failed")?
            .collect();

        if !keys.is_empty() {
            let _: () = guard.del(&keys).context("Redis DEL failed")?;
        }
        tracing::debug!(
            "Invalidated {} cached routes for project {}",
            keys.len(),
            project_id
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
