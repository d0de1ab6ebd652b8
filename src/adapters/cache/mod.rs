//! Cache adapters.
//!
//! Implementations of the `CacheProvider` port.
//!
//! ## Available Adapters
//!
//! - `InMemoryCache` - expiring map for development, tests and single-server
//! - `RedisCache` - Redis-backed for production multi-server
//!
//! ## Selection
//!
//! ```ignore
//! use truecheckia::adapters::cache::select_cache_provider;
//!
//! let backend = select_cache_provider(&config, clock).await;
//! if let Some(sweeper) = backend.sweeper {
//!     tokio::spawn(async move { sweeper.run(shutdown_rx).await });
//! }
//! ```

mod in_memory;
mod redis;

pub use in_memory::{CacheSweeper, InMemoryCache, DEFAULT_SWEEP_INTERVAL};
pub use self::redis::RedisCache;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ports::{CacheProvider, Clock};

/// Cache chosen for the lifetime of the process.
pub struct CacheBackend {
    pub provider: Arc<dyn CacheProvider>,
    /// Present only for the in-process backend; must be spawned by the caller.
    pub sweeper: Option<CacheSweeper>,
}

impl CacheBackend {
    /// In-process backend with its sweeper.
    pub fn in_memory(clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        let cache = Arc::new(InMemoryCache::new(clock));
        let sweeper = CacheSweeper::new(cache.clone(), config.cache.sweep_interval());
        Self {
            provider: cache,
            sweeper: Some(sweeper),
        }
    }
}

/// Pick the cache backend.
///
/// Redis is used only in production with a configured URL. A failed
/// connection at startup falls back to the in-process cache so the
/// service still comes up; limits then apply per instance.
pub async fn select_cache_provider(config: &AppConfig, clock: Arc<dyn Clock>) -> CacheBackend {
    if !config.uses_remote_cache() {
        tracing::info!("Using in-process cache");
        return CacheBackend::in_memory(clock, config);
    }

    match RedisCache::connect(&config.redis).await {
        Ok(cache) => CacheBackend {
            provider: Arc::new(cache),
            sweeper: None,
        },
        Err(e) => {
            tracing::error!("Redis unavailable, falling back to in-process cache: {}", e);
            CacheBackend::in_memory(clock, config)
        }
    }
}
