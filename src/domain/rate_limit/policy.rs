//! Static quota tables.
//!
//! These numbers are shared with the web application's pricing page and
//! upgrade prompts, so they are compile-time constants rather than
//! configuration.

use std::time::Duration;

use serde::Serialize;

use super::plan::{LimitTier, PlanTier};

/// Length of every request and cost window.
pub const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Request quota for one limit tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed in the window.
    pub requests: u32,
    /// Window length.
    #[serde(with = "duration_millis")]
    pub window: Duration,
    /// Message shown when the quota is exhausted.
    pub message: &'static str,
}

impl RateLimitPolicy {
    /// Window length in whole seconds, used as the counter TTL.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    /// Returns the request quota for a tier.
    pub fn for_tier(tier: LimitTier) -> Self {
        match tier {
            LimitTier::Free => Self {
                requests: 10,
                window: WINDOW,
                message: "Free plan limit reached. Upgrade to Pro for more requests.",
            },
            LimitTier::Pro => Self {
                requests: 100,
                window: WINDOW,
                message: "Pro plan limit reached. Please wait before making more requests.",
            },
            LimitTier::Enterprise => Self {
                requests: 1000,
                window: WINDOW,
                message: "Enterprise plan limit reached. Please contact support.",
            },
            LimitTier::Ip => Self {
                requests: 5,
                window: WINDOW,
                message: "Too many requests from this IP. Please sign in for higher limits.",
            },
        }
    }
}

/// Hourly spend ceiling for one plan, in US dollars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostPolicy {
    pub max_cost_per_hour: f64,
}

impl CostPolicy {
    /// Returns the spend ceiling for a plan.
    pub fn for_plan(plan: PlanTier) -> Self {
        let max_cost_per_hour = match plan {
            PlanTier::Free => 0.01,
            PlanTier::Pro => 0.50,
            PlanTier::Enterprise => 5.00,
        };
        Self { max_cost_per_hour }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_quotas_match_pricing() {
        assert_eq!(RateLimitPolicy::for_tier(LimitTier::Free).requests, 10);
        assert_eq!(RateLimitPolicy::for_tier(LimitTier::Pro).requests, 100);
        assert_eq!(RateLimitPolicy::for_tier(LimitTier::Enterprise).requests, 1000);
        assert_eq!(RateLimitPolicy::for_tier(LimitTier::Ip).requests, 5);
    }

    #[test]
    fn every_tier_uses_one_hour_window() {
        for tier in [LimitTier::Free, LimitTier::Pro, LimitTier::Enterprise, LimitTier::Ip] {
            let policy = RateLimitPolicy::for_tier(tier);
            assert_eq!(policy.window.as_millis(), 3_600_000);
            assert_eq!(policy.window_secs(), 3600);
        }
    }

    #[test]
    fn cost_ceilings_match_pricing() {
        assert_eq!(CostPolicy::for_plan(PlanTier::Free).max_cost_per_hour, 0.01);
        assert_eq!(CostPolicy::for_plan(PlanTier::Pro).max_cost_per_hour, 0.50);
        assert_eq!(CostPolicy::for_plan(PlanTier::Enterprise).max_cost_per_hour, 5.00);
    }

    #[test]
    fn higher_plans_have_higher_limits() {
        let free = RateLimitPolicy::for_tier(LimitTier::Free);
        let pro = RateLimitPolicy::for_tier(LimitTier::Pro);
        let ip = RateLimitPolicy::for_tier(LimitTier::Ip);
        assert!(ip.requests < free.requests);
        assert!(free.requests < pro.requests);
    }

    #[test]
    fn policy_serializes_window_in_millis() {
        let json = serde_json::to_string(&RateLimitPolicy::for_tier(LimitTier::Pro)).unwrap();
        assert!(json.contains("\"window\":3600000"));
        assert!(json.contains("\"requests\":100"));
    }
}
