//! Rate limiting services.
//!
//! Both managers are cheap to clone and share one `CacheProvider`; they
//! differ only in what they count.

mod cost_manager;
mod manager;

#[cfg(test)]
pub(crate) mod testing;

pub use cost_manager::CostRateLimitManager;
pub use manager::RateLimitManager;
