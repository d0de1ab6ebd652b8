//! HTTP adapter for rate limiting and usage metering.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    CostCheckRequest, CostCheckResponse, CostRecordRequest, CostRecordResponse,
    CostStatusResponse, Decision, HealthResponse, RateLimitStatusResponse,
};
pub use handlers::{RateLimitAppState, X_ADMIN_TOKEN};
pub use routes::{admin_routes, rate_limit_router, usage_routes};
