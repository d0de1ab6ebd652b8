//! Cache provider port - TTL key/value storage.
//!
//! The raw trait is fallible so that callers which must distinguish a
//! miss from an outage (the limiters) can do so. Everything else should
//! use [`CacheProviderExt`], which never fails: backend and encoding
//! errors are logged and degrade to a miss or a no-op.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache backend is unreachable or returned an error.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Stored value could not be encoded or decoded.
    #[error("cache value for '{key}' is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

/// Port for TTL key/value storage.
///
/// Values are opaque strings. Keys that are absent or whose TTL has
/// elapsed are indistinguishable.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Returns the stored value, or `None` if absent or expired.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a value, overwriting any previous value and TTL.
    ///
    /// `ttl = None` keeps the value until it is deleted.
    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>)
        -> Result<(), CacheError>;

    /// Removes a key. Removing an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Returns true if the key is present and not expired.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key owned by this provider.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Atomically adds `by` to an integer counter and returns the new value.
    ///
    /// A missing counter starts at zero. `ttl` is applied only when the
    /// counter has no expiry yet, so repeated increments do not extend
    /// the window.
    async fn incr(&self, key: &str, by: i64, ttl: Duration) -> Result<i64, CacheError>;

    /// Floating-point variant of [`CacheProvider::incr`].
    async fn incr_float(&self, key: &str, by: f64, ttl: Duration) -> Result<f64, CacheError>;

    /// Remaining lifetime of a key; `None` if absent or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Typed, never-failing convenience layer over [`CacheProvider`].
#[async_trait]
pub trait CacheProviderExt: CacheProvider {
    /// Returns the decoded value, or `None` on miss or any error.
    async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        let raw = match self.get_raw(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, backend = self.backend_name(), "Cache get failed: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "Discarding undecodable cache value: {}", e);
                None
            }
        }
    }

    /// Stores an encoded value; failures are logged and ignored.
    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>)
    where
        T: Serialize + Sync,
    {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, "Cannot encode cache value: {}", e);
                return;
            }
        };
        if let Err(e) = self.set_raw(key, raw, ttl).await {
            tracing::warn!(key, backend = self.backend_name(), "Cache set failed: {}", e);
        }
    }

    /// Removes a key; failures are logged and ignored.
    async fn delete(&self, key: &str) {
        if let Err(e) = self.del(key).await {
            tracing::warn!(key, backend = self.backend_name(), "Cache delete failed: {}", e);
        }
    }

    /// Returns true if the key is present; false on any error.
    async fn contains(&self, key: &str) -> bool {
        match self.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key, backend = self.backend_name(), "Cache exists failed: {}", e);
                false
            }
        }
    }

    /// Clears the cache; failures are logged and ignored.
    async fn flush(&self) {
        if let Err(e) = self.clear().await {
            tracing::warn!(backend = self.backend_name(), "Cache clear failed: {}", e);
        }
    }
}

impl<C: CacheProvider + ?Sized> CacheProviderExt for C {}
