//! Rate limit domain - plans, quotas, counter keys and decisions.
//!
//! Pure types only; the counting itself lives in the application layer
//! on top of the `CacheProvider` port.

mod errors;
mod keys;
mod outcome;
mod plan;
mod policy;

pub use errors::RateLimitError;
pub use keys::{CostBucketKey, RateLimitKey, RateLimitScope};
pub use outcome::{
    CostCheckResult, CostOutcome, LimitOutcome, RateLimitOutcome, RateLimitResult, HEADER_LIMIT,
    HEADER_REMAINING, HEADER_RESET,
};
pub use plan::{LimitTier, PlanTier};
pub use policy::{CostPolicy, RateLimitPolicy, WINDOW};
