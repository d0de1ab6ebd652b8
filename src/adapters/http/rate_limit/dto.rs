//! HTTP DTOs for rate limit and usage endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::rate_limit::{
    CostCheckResult, LimitOutcome, LimitTier, RateLimitResult, RateLimitScope,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to check an estimated spend against the hourly ceiling of the
/// caller's plan.
#[derive(Debug, Clone, Deserialize)]
pub struct CostCheckRequest {
    /// Estimated spend in US dollars.
    pub estimated_cost: f64,
}

/// Request to record actual spend.
#[derive(Debug, Clone, Deserialize)]
pub struct CostRecordRequest {
    /// Actual spend in US dollars.
    pub cost: f64,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// How a limiter reached its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied,
    /// The cache was unreachable and the request was let through.
    Indeterminate,
}

impl<T> From<&LimitOutcome<T>> for Decision {
    fn from(outcome: &LimitOutcome<T>) -> Self {
        match outcome {
            LimitOutcome::Allowed(_) => Decision::Allowed,
            LimitOutcome::Denied(_) => Decision::Denied,
            LimitOutcome::Indeterminate(_) => Decision::Indeterminate,
        }
    }
}

/// Request quota snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatusResponse {
    pub decision: Decision,
    pub allowed: bool,
    pub scope: RateLimitScope,
    pub tier: LimitTier,
    pub limit: u32,
    pub remaining: u32,
    pub count: u32,
    /// Unix seconds.
    pub reset_at: u64,
    /// Hourly spend, present for signed-in users only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostStatusResponse>,
}

impl RateLimitStatusResponse {
    pub fn new(decision: Decision, result: &RateLimitResult) -> Self {
        Self {
            decision,
            allowed: result.allowed,
            scope: result.scope,
            tier: result.tier,
            limit: result.limit,
            remaining: result.remaining,
            count: result.count,
            reset_at: result.reset_at.as_unix_secs(),
            cost: None,
        }
    }

    pub fn with_cost(mut self, cost: CostStatusResponse) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Hourly spend snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CostStatusResponse {
    pub current_cost: f64,
    pub max_cost_per_hour: f64,
    pub remaining_cost: f64,
}

/// Result of an accepted cost check.
#[derive(Debug, Clone, Serialize)]
pub struct CostCheckResponse {
    pub decision: Decision,
    pub allowed: bool,
    pub current_cost: f64,
    pub remaining_cost: f64,
    pub max_cost_per_hour: f64,
    /// Unix seconds.
    pub resets_at: u64,
}

impl CostCheckResponse {
    pub fn new(decision: Decision, result: &CostCheckResult) -> Self {
        Self {
            decision,
            allowed: result.allowed,
            current_cost: result.current_cost,
            remaining_cost: result.remaining_cost,
            max_cost_per_hour: result.max_cost_per_hour,
            resets_at: result.resets_at.as_unix_secs(),
        }
    }
}

/// Result of recording spend.
#[derive(Debug, Clone, Serialize)]
pub struct CostRecordResponse {
    pub recorded: f64,
    pub current_cost: f64,
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache: &'static str,
}
