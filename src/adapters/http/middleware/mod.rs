//! HTTP middleware for axum.
//!
//! - `rate_limit` - per-user / per-IP request quotas and caller resolution

pub mod rate_limit;

pub use rate_limit::{extract_client_ip, rate_limit_middleware, Caller, X_USER_ID, X_USER_PLAN};
