//! Domain layer - value objects, quota tables and decisions.

pub mod foundation;
pub mod rate_limit;
