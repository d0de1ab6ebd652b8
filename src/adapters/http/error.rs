//! JSON error responses.
//!
//! Every handler error funnels through [`ApiError`], which renders a
//! [`ErrorResponse`] with the status carried by the underlying domain error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::rate_limit::RateLimitError;

/// Standard error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Create an error response with details.
    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Handler error rendered as JSON.
#[derive(Debug)]
pub struct ApiError(DomainError);

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self(DomainError::new(ErrorCode::Unauthorized, message))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self(DomainError::new(ErrorCode::Forbidden, message))
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, "Request failed: {}", self.0.message);
        }

        let body = if self.0.details.is_empty() {
            ErrorResponse::new(self.0.code.to_string(), self.0.message)
        } else {
            let details = serde_json::to_value(&self.0.details).unwrap_or_default();
            ErrorResponse::with_details(self.0.code.to_string(), self.0.message, details)
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_plan_maps_to_400() {
        let response = ApiError::from(RateLimitError::invalid_plan("GOLD")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error_code"], "INVALID_PLAN");
        assert_eq!(body["message"], "Invalid plan: GOLD");
        assert_eq!(body["details"]["plan"], "GOLD");
    }

    #[tokio::test]
    async fn invalid_cost_maps_to_400() {
        let response = ApiError::from(RateLimitError::invalid_cost(-1.0)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "INVALID_COST");
    }

    #[tokio::test]
    async fn unauthorized_has_no_details() {
        let response = ApiError::unauthorized("Admin token required").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error_code"], "UNAUTHORIZED");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn forbidden_maps_to_403() {
        assert_eq!(ApiError::forbidden("nope").status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn error_response_skips_missing_details() {
        let json = serde_json::to_value(ErrorResponse::new("X", "y")).unwrap();
        assert_eq!(json, serde_json::json!({"error_code": "X", "message": "y"}));
    }
}
