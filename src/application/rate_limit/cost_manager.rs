//! CostRateLimitManager - hourly spend ceilings per user.
//!
//! Spend is accumulated in a float counter per user and clock hour. A
//! check only records the estimate when it fits under the ceiling; a
//! rejected estimate leaves the bucket untouched.
//!
//! The check reads and then increments, so two concurrent checks near
//! the ceiling can both pass. The overshoot is bounded by one estimate.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::rate_limit::{
    CostBucketKey, CostCheckResult, CostOutcome, CostPolicy, PlanTier, RateLimitError, WINDOW,
};
use crate::ports::{CacheProvider, Clock};

/// Slack for float accumulation when comparing against a ceiling.
const COST_EPSILON: f64 = 1e-9;

/// Dollar-denominated limiter over a shared cache.
#[derive(Clone)]
pub struct CostRateLimitManager {
    cache: Arc<dyn CacheProvider>,
    clock: Arc<dyn Clock>,
}

impl CostRateLimitManager {
    pub fn new(cache: Arc<dyn CacheProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    /// Check whether `estimated_cost` fits in the user's hourly budget and
    /// reserve it if so.
    ///
    /// # Errors
    ///
    /// - `InvalidPlan` if `plan` is not a known tier
    /// - `InvalidCost` if the estimate is negative or not finite
    /// - `InvalidIdentifier` if `user_id` is blank
    pub async fn check_cost_rate_limit(
        &self,
        user_id: &str,
        plan: &str,
        estimated_cost: f64,
    ) -> Result<CostOutcome, RateLimitError> {
        let plan = PlanTier::parse(plan)?;
        let user_id = UserId::new(user_id)?;
        let estimated_cost = validate_cost(estimated_cost)?;
        Ok(self.check(&user_id, plan, estimated_cost).await)
    }

    /// Typed variant of [`Self::check_cost_rate_limit`]; the cost must
    /// already be validated.
    pub async fn check(&self, user_id: &UserId, plan: PlanTier, estimated_cost: f64) -> CostOutcome {
        let policy = CostPolicy::for_plan(plan);
        let bucket = CostBucketKey::at(user_id, self.clock.now());
        let key = bucket.to_cache_key();
        let ceiling = policy.max_cost_per_hour;

        let current = match self.read(&key).await {
            Some(current) => current,
            None => {
                return CostOutcome::Indeterminate(CostCheckResult {
                    allowed: true,
                    remaining_cost: (ceiling - estimated_cost).max(0.0),
                    current_cost: estimated_cost,
                    max_cost_per_hour: ceiling,
                    resets_at: bucket.closes_at(),
                });
            }
        };

        if current + estimated_cost > ceiling + COST_EPSILON {
            tracing::debug!(
                user_id = %user_id,
                current,
                estimated_cost,
                ceiling,
                "Cost limit exceeded"
            );
            return CostOutcome::Denied(CostCheckResult {
                allowed: false,
                remaining_cost: (ceiling - current).max(0.0),
                current_cost: current,
                max_cost_per_hour: ceiling,
                resets_at: bucket.closes_at(),
            });
        }

        match self.cache.incr_float(&key, estimated_cost, WINDOW).await {
            Ok(total) => CostOutcome::Allowed(CostCheckResult {
                allowed: true,
                remaining_cost: (ceiling - total).max(0.0),
                current_cost: total,
                max_cost_per_hour: ceiling,
                resets_at: bucket.closes_at(),
            }),
            Err(e) => {
                tracing::warn!(key = %key, "Failed to reserve estimated cost, allowing: {}", e);
                let total = current + estimated_cost;
                CostOutcome::Indeterminate(CostCheckResult {
                    allowed: true,
                    remaining_cost: (ceiling - total).max(0.0),
                    current_cost: total,
                    max_cost_per_hour: ceiling,
                    resets_at: bucket.closes_at(),
                })
            }
        }
    }

    /// Add actual spend to the current hour, regardless of ceiling.
    ///
    /// Cache failures are logged; the spend is then lost.
    pub async fn record_cost(&self, user_id: &str, cost: f64) -> Result<(), RateLimitError> {
        let user_id = UserId::new(user_id)?;
        let cost = validate_cost(cost)?;
        let key = CostBucketKey::at(&user_id, self.clock.now()).to_cache_key();

        match self.cache.incr_float(&key, cost, WINDOW).await {
            Ok(total) => {
                tracing::debug!(user_id = %user_id, cost, total, "Recorded cost");
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, cost, "Failed to record cost: {}", e);
            }
        }
        Ok(())
    }

    /// Spend accumulated in the current hour; zero when unknown.
    pub async fn current_cost(&self, user_id: &UserId) -> f64 {
        let key = CostBucketKey::at(user_id, self.clock.now()).to_cache_key();
        self.read(&key).await.unwrap_or(0.0)
    }

    /// `None` only when the store could not be read.
    async fn read(&self, key: &str) -> Option<f64> {
        match self.cache.get_raw(key).await {
            Ok(None) => Some(0.0),
            Ok(Some(raw)) => match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, "Ignoring malformed cost counter: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!(key, backend = self.cache.backend_name(), "Cost lookup failed: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for CostRateLimitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostRateLimitManager")
            .field("backend", &self.cache.backend_name())
            .finish_non_exhaustive()
    }
}

fn validate_cost(cost: f64) -> Result<f64, RateLimitError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(cost)
    } else {
        Err(RateLimitError::InvalidCost(cost))
    }
}
