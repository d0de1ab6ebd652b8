//! Redis-backed cache for production multi-server deployments.
//!
//! Counters use `INCRBY`/`INCRBYFLOAT`, which are atomic on the server, so
//! concurrent requests from any number of instances are counted exactly
//! once. The window TTL is attached only when the counter has none.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::ports::{CacheError, CacheProvider};

const SCAN_BATCH: usize = 500;

/// Redis cache sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisCache {
    /// Wrap an existing connection.
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Open a connection using the configured URL and timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url.as_str()).map_err(unavailable)?;
        let conn = tokio::time::timeout(config.timeout(), client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| {
                CacheError::Unavailable(format!(
                    "connection timed out after {}s",
                    config.timeout_secs
                ))
            })?
            .map_err(unavailable)?;

        tracing::info!(prefix = %config.key_prefix, "Connected to Redis cache");
        Ok(Self::new(conn, config.key_prefix.clone()))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Attach `ttl` to a key that currently has no expiry.
    async fn ensure_expiry(&self, key: &str, pttl: i64, ttl: Duration) -> Result<(), CacheError> {
        if pttl >= 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.pexpire::<_, ()>(key, ttl.as_millis() as i64)
            .await
            .map_err(unavailable)
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

/// Convert a `PTTL` reply into a remaining lifetime.
///
/// Redis answers -2 for a missing key and -1 for a key without expiry.
fn pttl_to_duration(pttl: i64) -> Option<Duration> {
    (pttl >= 0).then(|| Duration::from_millis(pttl as u64))
}

#[async_trait]
impl CacheProvider for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(self.namespaced(key)).await.map_err(unavailable)
    }

    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.namespaced(key)).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        cmd.query_async::<_, ()>(&mut conn).await.map_err(unavailable)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.namespaced(key))
            .await
            .map_err(unavailable)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(self.namespaced(key)).await.map_err(unavailable)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();

        if self.key_prefix.is_empty() {
            return redis::cmd("FLUSHDB")
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(unavailable);
        }

        // Only remove our own namespace; the database may be shared.
        let pattern = format!("{}*", self.key_prefix);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            if !keys.is_empty() {
                conn.del::<_, ()>(keys).await.map_err(unavailable)?;
            }
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }

    async fn incr(&self, key: &str, by: i64, ttl: Duration) -> Result<i64, CacheError> {
        let key = self.namespaced(key);
        let mut conn = self.conn.clone();
        let (count, pttl): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("INCRBY")
            .arg(&key)
            .arg(by)
            .cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        self.ensure_expiry(&key, pttl, ttl).await?;
        Ok(count)
    }

    async fn incr_float(&self, key: &str, by: f64, ttl: Duration) -> Result<f64, CacheError> {
        let key = self.namespaced(key);
        let mut conn = self.conn.clone();
        let (total, pttl): (f64, i64) = redis::pipe()
            .atomic()
            .cmd("INCRBYFLOAT")
            .arg(&key)
            .arg(by)
            .cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        self.ensure_expiry(&key, pttl, ttl).await?;
        Ok(total)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.conn.clone();
        let pttl: i64 = conn.pttl::<_, i64>(self.namespaced(key)).await.map_err(unavailable)?;
        Ok(pttl_to_duration(pttl))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
