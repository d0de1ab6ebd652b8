//! Rate-limit specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | InvalidPlan | 400 |
//! | InvalidCost | 400 |
//! | InvalidIdentifier | 400 |

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors raised by the rate and cost limiters.
///
/// Cache failures are deliberately absent: they never reach callers and
/// are reported as an indeterminate outcome instead.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitError {
    /// Plan name is not one of the known tiers.
    InvalidPlan(String),

    /// Cost amount is negative or not a finite number.
    InvalidCost(f64),

    /// A caller identifier (user id, ip) failed validation.
    InvalidIdentifier { field: String, reason: String },
}

impl RateLimitError {
    pub fn invalid_plan(plan: impl Into<String>) -> Self {
        RateLimitError::InvalidPlan(plan.into())
    }

    pub fn invalid_cost(cost: f64) -> Self {
        RateLimitError::InvalidCost(cost)
    }

    pub fn invalid_identifier(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RateLimitError::InvalidIdentifier {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RateLimitError::InvalidPlan(_) => ErrorCode::InvalidPlan,
            RateLimitError::InvalidCost(_) => ErrorCode::InvalidCost,
            RateLimitError::InvalidIdentifier { .. } => ErrorCode::ValidationFailed,
        }
    }

    /// HTTP status code to answer with.
    pub fn status_code(&self) -> u16 {
        self.code().http_status()
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            RateLimitError::InvalidPlan(plan) => format!("Invalid plan: {}", plan),
            RateLimitError::InvalidCost(cost) => {
                format!("Cost must be a non-negative number, got {}", cost)
            }
            RateLimitError::InvalidIdentifier { field, reason } => {
                format!("Invalid {}: {}", field, reason)
            }
        }
    }
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RateLimitError {}

impl From<ValidationError> for RateLimitError {
    fn from(err: ValidationError) -> Self {
        RateLimitError::invalid_identifier(err.field().to_string(), err.to_string())
    }
}

impl From<RateLimitError> for DomainError {
    fn from(err: RateLimitError) -> Self {
        let domain = DomainError::new(err.code(), err.message());
        match err {
            RateLimitError::InvalidPlan(plan) => domain.with_detail("plan", plan),
            RateLimitError::InvalidCost(cost) => domain.with_detail("cost", cost.to_string()),
            RateLimitError::InvalidIdentifier { field, .. } => domain.with_detail("field", field),
        }
    }
}
