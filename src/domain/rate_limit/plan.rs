//! Subscription plan tiers and the limit tiers derived from them.
//!
//! A `PlanTier` is what a signed-in user pays for. A `LimitTier` is what
//! the rate limiter enforces: every plan plus the `Ip` pseudo-tier used for
//! anonymous callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::RateLimitError;

/// Subscription plan of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    /// All plans, cheapest first.
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Pro, PlanTier::Enterprise];

    /// Wire name used in headers, JSON and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Pro => "PRO",
            PlanTier::Enterprise => "ENTERPRISE",
        }
    }

    /// Parses a plan name, rejecting anything that is not a known tier.
    ///
    /// Matching ignores ASCII case and surrounding whitespace. There is no
    /// fallback tier.
    pub fn parse(plan: &str) -> Result<Self, RateLimitError> {
        let trimmed = plan.trim();
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RateLimitError::invalid_plan(plan))
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Tier whose request quota applies to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LimitTier {
    Free,
    Pro,
    Enterprise,
    /// Unauthenticated callers, limited by client address.
    Ip,
}

impl LimitTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitTier::Free => "FREE",
            LimitTier::Pro => "PRO",
            LimitTier::Enterprise => "ENTERPRISE",
            LimitTier::Ip => "IP",
        }
    }
}

impl From<PlanTier> for LimitTier {
    fn from(plan: PlanTier) -> Self {
        match plan {
            PlanTier::Free => LimitTier::Free,
            PlanTier::Pro => LimitTier::Pro,
            PlanTier::Enterprise => LimitTier::Enterprise,
        }
    }
}

impl fmt::Display for LimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_plans() {
        assert_eq!(PlanTier::parse("FREE").unwrap(), PlanTier::Free);
        assert_eq!(PlanTier::parse("PRO").unwrap(), PlanTier::Pro);
        assert_eq!(PlanTier::parse("ENTERPRISE").unwrap(), PlanTier::Enterprise);
    }

    #[test]
    fn parse_ignores_case_and_whitespace() {
        assert_eq!(PlanTier::parse(" pro ").unwrap(), PlanTier::Pro);
        assert_eq!("Enterprise".parse::<PlanTier>().unwrap(), PlanTier::Enterprise);
    }

    #[test]
    fn parse_rejects_unknown_plan() {
        let err = PlanTier::parse("GOLD").unwrap_err();
        assert_eq!(err, RateLimitError::InvalidPlan("GOLD".to_string()));
    }

    #[test]
    fn parse_rejects_ip_pseudo_tier() {
        assert!(PlanTier::parse("IP").is_err());
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(PlanTier::parse("").is_err());
    }

    #[test]
    fn plan_serializes_uppercase() {
        let json = serde_json::to_string(&PlanTier::Enterprise).unwrap();
        assert_eq!(json, "\"ENTERPRISE\"");
    }

    #[test]
    fn plan_converts_to_limit_tier() {
        assert_eq!(LimitTier::from(PlanTier::Free), LimitTier::Free);
        assert_eq!(LimitTier::from(PlanTier::Pro).as_str(), "PRO");
    }
}
