//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Unique identifier for a user (from the auth provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client network address used for anonymous rate limiting.
///
/// Kept as the raw string the proxy reported; no parsing is attempted
/// because forwarded headers are not guaranteed to contain valid IPs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIp(String);

impl ClientIp {
    /// Creates a new ClientIp, returning error if empty.
    pub fn new(ip: impl Into<String>) -> Result<Self, ValidationError> {
        let ip = ip.into();
        let trimmed = ip.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("ip"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Placeholder used when no address can be determined.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
