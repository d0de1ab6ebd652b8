//! Results of rate and cost limit checks.
//!
//! Every check produces one of three outcomes. `Indeterminate` means the
//! backing store could not be consulted; callers treat it as allowed
//! (fail open) but can still tell it apart from a genuine allow.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::foundation::Timestamp;

use super::keys::RateLimitScope;
use super::plan::LimitTier;

/// Header carrying the window's request ceiling.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the requests left in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the window reset time as Unix seconds.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// Three-way decision of a limiter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", content = "result", rename_all = "snake_case")]
pub enum LimitOutcome<T> {
    /// Within quota.
    Allowed(T),
    /// Quota exhausted.
    Denied(T),
    /// Store unavailable; treated as allowed.
    Indeterminate(T),
}

impl<T> LimitOutcome<T> {
    /// True unless the quota was definitely exhausted.
    pub fn is_allowed(&self) -> bool {
        !self.is_denied()
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, LimitOutcome::Denied(_))
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, LimitOutcome::Indeterminate(_))
    }

    /// Borrows the details regardless of decision.
    pub fn result(&self) -> &T {
        match self {
            LimitOutcome::Allowed(r) | LimitOutcome::Denied(r) | LimitOutcome::Indeterminate(r) => r,
        }
    }

    /// Takes the details regardless of decision.
    pub fn into_result(self) -> T {
        match self {
            LimitOutcome::Allowed(r) | LimitOutcome::Denied(r) | LimitOutcome::Indeterminate(r) => r,
        }
    }
}

/// Details of a request-count check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the window, never negative.
    pub remaining: u32,
    /// When the counter expires.
    pub reset_at: Timestamp,
    /// Window ceiling.
    pub limit: u32,
    /// Requests counted in the window, including this one for checks.
    pub count: u32,
    pub scope: RateLimitScope,
    pub tier: LimitTier,
    /// Message to show the caller when denied.
    pub message: &'static str,
}

impl RateLimitResult {
    /// Seconds the caller should wait before retrying, at least one.
    pub fn retry_after_secs(&self, now: Timestamp) -> u64 {
        now.until(&self.reset_at)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .max(1)
    }

    /// Standard rate-limit response headers.
    pub fn headers(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_at.as_unix_secs().to_string()),
        ])
    }
}

/// Details of an hourly spend check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostCheckResult {
    /// Whether the spend may proceed.
    pub allowed: bool,
    /// Budget left in the hour, never negative.
    ///
    /// For a denied check this is the budget left before the rejected
    /// request, since the rejected amount is not recorded.
    pub remaining_cost: f64,
    /// Spend recorded in the hour after this check.
    pub current_cost: f64,
    /// Plan ceiling.
    pub max_cost_per_hour: f64,
    /// When the hourly bucket closes.
    pub resets_at: Timestamp,
}

/// Outcome of a request-count check.
pub type RateLimitOutcome = LimitOutcome<RateLimitResult>;

/// Outcome of an hourly spend check.
pub type CostOutcome = LimitOutcome<CostCheckResult>;
