//! Application layer - services that enforce quotas.
//!
//! Services here depend only on ports (`CacheProvider`, `Clock`) and domain
//! types, so they run unchanged over the in-process and Redis caches.

pub mod rate_limit;

pub use rate_limit::{CostRateLimitManager, RateLimitManager};
