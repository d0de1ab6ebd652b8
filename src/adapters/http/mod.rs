//! HTTP adapters - REST API implementations.

pub mod error;
pub mod middleware;
pub mod rate_limit;

pub use error::{ApiError, ErrorResponse};
pub use rate_limit::{rate_limit_router, RateLimitAppState};
