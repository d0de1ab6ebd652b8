//! Cache keys for request and cost counters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ClientIp, Timestamp, UserId};

/// Dimension along which a request is counted.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// Per-authenticated-user rate limit.
    User,
    /// Per-IP address rate limit.
    Ip,
}

impl RateLimitScope {
    /// Returns the string representation of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::User => "user",
            RateLimitScope::Ip => "ip",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key identifying one request counter.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub scope: RateLimitScope,
    /// User ID or IP address, depending on scope.
    pub identifier: String,
}

impl RateLimitKey {
    /// Creates a user-based rate limit key.
    pub fn user(user_id: &UserId) -> Self {
        Self {
            scope: RateLimitScope::User,
            identifier: user_id.to_string(),
        }
    }

    /// Creates an IP-based rate limit key.
    pub fn ip(ip: &ClientIp) -> Self {
        Self {
            scope: RateLimitScope::Ip,
            identifier: ip.to_string(),
        }
    }

    /// Returns the cache key string, e.g. `rate_limit:user:u1`.
    pub fn to_cache_key(&self) -> String {
        format!("rate_limit:{}:{}", self.scope.as_str(), self.identifier)
    }
}

/// Key of the spend bucket for one user and one clock hour.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CostBucketKey {
    pub user_id: UserId,
    /// Whole hours since the Unix epoch.
    pub epoch_hour: u64,
}

impl CostBucketKey {
    /// Bucket that `at` falls into.
    pub fn at(user_id: &UserId, at: Timestamp) -> Self {
        Self {
            user_id: user_id.clone(),
            epoch_hour: at.epoch_hour(),
        }
    }

    /// Returns the cache key string, e.g. `cost_limit:u1:473698`.
    pub fn to_cache_key(&self) -> String {
        format!("cost_limit:{}:{}", self.user_id, self.epoch_hour)
    }

    /// When this bucket stops receiving spend.
    pub fn closes_at(&self) -> Timestamp {
        Timestamp::from_unix_secs((self.epoch_hour + 1) * 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_format() {
        let user_id = UserId::new("u1").unwrap();
        assert_eq!(RateLimitKey::user(&user_id).to_cache_key(), "rate_limit:user:u1");
    }

    #[test]
    fn ip_key_format() {
        let ip = ClientIp::new("10.0.0.1").unwrap();
        let key = RateLimitKey::ip(&ip);
        assert_eq!(key.scope, RateLimitScope::Ip);
        assert_eq!(key.to_cache_key(), "rate_limit:ip:10.0.0.1");
    }

    #[test]
    fn cost_key_uses_epoch_hour() {
        let user_id = UserId::new("u1").unwrap();
        // 2024-01-15T10:30:00Z
        let key = CostBucketKey::at(&user_id, Timestamp::from_unix_secs(1705314600));
        assert_eq!(key.epoch_hour, 473698);
        assert_eq!(key.to_cache_key(), "cost_limit:u1:473698");
    }

    #[test]
    fn cost_bucket_closes_at_next_hour() {
        let user_id = UserId::new("u1").unwrap();
        let key = CostBucketKey::at(&user_id, Timestamp::from_unix_secs(1705314600));
        assert_eq!(key.closes_at(), Timestamp::from_unix_secs(1705316400));
    }

    #[test]
    fn scope_as_str_returns_correct_values() {
        assert_eq!(RateLimitScope::User.as_str(), "user");
        assert_eq!(RateLimitScope::Ip.as_str(), "ip");
    }
}
