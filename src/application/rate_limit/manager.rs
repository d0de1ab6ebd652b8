//! RateLimitManager - hourly request quotas per user or per IP.
//!
//! Counting is a single atomic `incr` on the cache. The counter's TTL is
//! set by the first request of a window, so the window is fixed: later
//! requests do not push the reset time back.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::foundation::{ClientIp, Timestamp, UserId};
use crate::domain::rate_limit::{
    LimitTier, PlanTier, RateLimitError, RateLimitKey, RateLimitOutcome, RateLimitPolicy,
    RateLimitResult,
};
use crate::ports::{CacheProvider, CacheProviderExt, Clock};

/// Request-count limiter over a shared cache.
#[derive(Clone)]
pub struct RateLimitManager {
    cache: Arc<dyn CacheProvider>,
    clock: Arc<dyn Clock>,
}

impl RateLimitManager {
    pub fn new(cache: Arc<dyn CacheProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    /// Count one request against a user's plan quota.
    ///
    /// # Errors
    ///
    /// `InvalidPlan` if `plan` is not a known tier; there is no default.
    pub async fn check_user_rate_limit(
        &self,
        user_id: &str,
        plan: &str,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        let plan = PlanTier::parse(plan)?;
        let user_id = UserId::new(user_id)?;
        Ok(self.check_user(&user_id, plan).await)
    }

    /// Typed variant of [`Self::check_user_rate_limit`].
    pub async fn check_user(&self, user_id: &UserId, plan: PlanTier) -> RateLimitOutcome {
        self.count_request(RateLimitKey::user(user_id), plan.into())
            .await
    }

    /// Count one request against the anonymous per-IP quota.
    pub async fn check_ip_rate_limit(&self, ip: &str) -> Result<RateLimitOutcome, RateLimitError> {
        let ip = ClientIp::new(ip)?;
        Ok(self.check_ip(&ip).await)
    }

    /// Typed variant of [`Self::check_ip_rate_limit`].
    pub async fn check_ip(&self, ip: &ClientIp) -> RateLimitOutcome {
        self.count_request(RateLimitKey::ip(ip), LimitTier::Ip).await
    }

    /// Current quota for a user without consuming a request.
    pub async fn get_user_rate_limit_status(
        &self,
        user_id: &str,
        plan: &str,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        let plan = PlanTier::parse(plan)?;
        let user_id = UserId::new(user_id)?;
        Ok(self.user_status(&user_id, plan).await)
    }

    /// Typed variant of [`Self::get_user_rate_limit_status`].
    pub async fn user_status(&self, user_id: &UserId, plan: PlanTier) -> RateLimitOutcome {
        self.read_status(RateLimitKey::user(user_id), plan.into())
            .await
    }

    /// Current anonymous quota for an IP without consuming a request.
    pub async fn get_ip_rate_limit_status(
        &self,
        ip: &str,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        let ip = ClientIp::new(ip)?;
        Ok(self.read_status(RateLimitKey::ip(&ip), LimitTier::Ip).await)
    }

    /// Response headers describing a check result.
    pub fn get_rate_limit_headers(result: &RateLimitResult) -> BTreeMap<&'static str, String> {
        result.headers()
    }

    /// Drop a user's counter, restoring the full quota.
    pub async fn reset_user_rate_limit(&self, user_id: &str) -> Result<(), RateLimitError> {
        let user_id = UserId::new(user_id)?;
        let key = RateLimitKey::user(&user_id).to_cache_key();
        self.cache.delete(&key).await;
        tracing::info!(user_id = %user_id, "Rate limit reset for user");
        Ok(())
    }

    /// Drop an IP's counter, restoring the full quota.
    pub async fn reset_ip_rate_limit(&self, ip: &str) -> Result<(), RateLimitError> {
        let ip = ClientIp::new(ip)?;
        let key = RateLimitKey::ip(&ip).to_cache_key();
        self.cache.delete(&key).await;
        tracing::info!(ip = %ip, "Rate limit reset for IP");
        Ok(())
    }

    /// Limit a request by exactly one dimension.
    ///
    /// Uses the user's plan when both a user id and a recognized plan are
    /// present, and the client IP otherwise. An unrecognized plan is not
    /// an error here; the caller simply falls back to IP limiting.
    pub async fn with_rate_limit(
        &self,
        user_id: Option<&str>,
        plan: Option<&str>,
        ip: &str,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        match Self::resolve_user(user_id, plan) {
            Some((user_id, plan)) => Ok(self.check_user(&user_id, plan).await),
            None => self.check_ip_rate_limit(ip).await,
        }
    }

    /// The user quota a caller is limited by, if any.
    ///
    /// `None` unless both a valid user id and a recognized plan are given;
    /// such callers are limited by IP.
    pub fn resolve_user(user_id: Option<&str>, plan: Option<&str>) -> Option<(UserId, PlanTier)> {
        let user_id = UserId::new(user_id?).ok()?;
        let plan = PlanTier::parse(plan?).ok()?;
        Some((user_id, plan))
    }

    async fn count_request(&self, key: RateLimitKey, tier: LimitTier) -> RateLimitOutcome {
        let policy = RateLimitPolicy::for_tier(tier);
        let cache_key = key.to_cache_key();
        let now = self.clock.now();

        let count = match self.cache.incr(&cache_key, 1, policy.window).await {
            Ok(count) => clamp_count(count),
            Err(e) => {
                tracing::warn!(
                    key = %cache_key,
                    backend = self.cache.backend_name(),
                    "Rate limit check failed, allowing request: {}",
                    e
                );
                return RateLimitOutcome::Indeterminate(open_result(&key, tier, &policy, now));
            }
        };

        let reset_at = self.reset_at(&cache_key, &policy, now).await;
        let result = RateLimitResult {
            allowed: count <= policy.requests,
            remaining: policy.requests.saturating_sub(count),
            reset_at,
            limit: policy.requests,
            count,
            scope: key.scope,
            tier,
            message: policy.message,
        };

        if result.allowed {
            RateLimitOutcome::Allowed(result)
        } else {
            tracing::debug!(key = %cache_key, count, limit = policy.requests, "Rate limit exceeded");
            RateLimitOutcome::Denied(result)
        }
    }

    /// Read the counter without incrementing it.
    ///
    /// `allowed` answers whether one more request would fit.
    async fn read_status(&self, key: RateLimitKey, tier: LimitTier) -> RateLimitOutcome {
        let policy = RateLimitPolicy::for_tier(tier);
        let cache_key = key.to_cache_key();
        let now = self.clock.now();

        let raw = match self.cache.get_raw(&cache_key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %cache_key, "Rate limit status unavailable: {}", e);
                return RateLimitOutcome::Indeterminate(open_result(&key, tier, &policy, now));
            }
        };
        let count = match raw.map(|raw| raw.parse::<i64>()) {
            None => 0,
            Some(Ok(count)) => clamp_count(count),
            Some(Err(e)) => {
                tracing::warn!(key = %cache_key, "Ignoring malformed rate limit counter: {}", e);
                return RateLimitOutcome::Indeterminate(open_result(&key, tier, &policy, now));
            }
        };

        let reset_at = self.reset_at(&cache_key, &policy, now).await;
        let result = RateLimitResult {
            allowed: count < policy.requests,
            remaining: policy.requests.saturating_sub(count),
            reset_at,
            limit: policy.requests,
            count,
            scope: key.scope,
            tier,
            message: policy.message,
        };

        if result.allowed {
            RateLimitOutcome::Allowed(result)
        } else {
            RateLimitOutcome::Denied(result)
        }
    }

    async fn reset_at(&self, cache_key: &str, policy: &RateLimitPolicy, now: Timestamp) -> Timestamp {
        match self.cache.ttl(cache_key).await {
            Ok(Some(ttl)) => now.plus(ttl),
            Ok(None) => now.plus(policy.window),
            Err(e) => {
                tracing::debug!(key = cache_key, "Falling back to full window for reset: {}", e);
                now.plus(policy.window)
            }
        }
    }
}

impl std::fmt::Debug for RateLimitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitManager")
            .field("backend", &self.cache.backend_name())
            .finish_non_exhaustive()
    }
}

fn clamp_count(count: i64) -> u32 {
    count.clamp(0, u32::MAX as i64) as u32
}

/// Result reported when the store could not be consulted.
fn open_result(
    key: &RateLimitKey,
    tier: LimitTier,
    policy: &RateLimitPolicy,
    now: Timestamp,
) -> RateLimitResult {
    RateLimitResult {
        allowed: true,
        remaining: policy.requests,
        reset_at: now.plus(policy.window),
        limit: policy.requests,
        count: 0,
        scope: key.scope,
        tier,
        message: policy.message,
    }
}
