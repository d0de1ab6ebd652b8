//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `cache` - Cache backends (in-memory, Redis)
//! - `clock` - Manually driven clock
//! - `http` - axum routes and middleware

pub mod cache;
pub mod clock;
pub mod http;

pub use cache::{select_cache_provider, CacheBackend, CacheSweeper, InMemoryCache, RedisCache};
pub use clock::ManualClock;
