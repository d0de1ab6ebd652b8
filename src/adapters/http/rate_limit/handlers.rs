//! HTTP handlers for rate limit status, administration and usage metering.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::adapters::http::middleware::Caller;
use crate::application::{CostRateLimitManager, RateLimitManager};
use crate::domain::foundation::{ErrorCode, UserId};
use crate::domain::rate_limit::{CostPolicy, LimitOutcome, RateLimitError};
use crate::ports::{CacheProvider, Clock};

use super::dto::{
    CostCheckRequest, CostCheckResponse, CostRecordRequest, CostRecordResponse,
    CostStatusResponse, Decision, HealthResponse, RateLimitStatusResponse,
};

/// Header carrying the administrator token.
pub static X_ADMIN_TOKEN: HeaderName = HeaderName::from_static("x-admin-token");

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the rate limit endpoints and middleware.
#[derive(Clone)]
pub struct RateLimitAppState {
    pub rate_limits: RateLimitManager,
    pub costs: CostRateLimitManager,
    pub clock: Arc<dyn Clock>,
    /// Admin endpoints are disabled when unset.
    pub admin_token: Option<Arc<str>>,
    pub cache_backend: &'static str,
}

impl RateLimitAppState {
    pub fn new(
        cache: Arc<dyn CacheProvider>,
        clock: Arc<dyn Clock>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            rate_limits: RateLimitManager::new(cache.clone(), clock.clone()),
            costs: CostRateLimitManager::new(cache.clone(), clock.clone()),
            clock,
            admin_token: admin_token.map(Arc::from),
            cache_backend: cache.backend_name(),
        }
    }

    fn authorize_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Err(ApiError::forbidden("Admin endpoints are disabled"));
        };
        let supplied = headers
            .get(&X_ADMIN_TOKEN)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Admin token required"))?;

        if bool::from(supplied.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            tracing::warn!("Rejected admin request with invalid token");
            Err(ApiError::unauthorized("Invalid admin token"))
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health - Liveness probe
pub async fn health(State(state): State<RateLimitAppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache: state.cache_backend,
    })
}

/// GET /api/rate-limit/status - Current quota of the caller
///
/// Reports the same quota the middleware counts against: the user quota
/// plus hourly spend when `X-User-Id` and a recognized `X-User-Plan` are
/// present, the caller's address quota otherwise. Nothing is consumed.
pub async fn get_status(
    State(state): State<RateLimitAppState>,
    caller: Caller,
) -> Result<Json<RateLimitStatusResponse>, ApiError> {
    let Some((user_id, plan)) = RateLimitManager::resolve_user(caller.user_id(), caller.plan())
    else {
        let outcome = state.rate_limits.get_ip_rate_limit_status(caller.ip.as_str()).await?;
        return Ok(Json(RateLimitStatusResponse::new(
            Decision::from(&outcome),
            outcome.result(),
        )));
    };

    let outcome = state.rate_limits.user_status(&user_id, plan).await;
    let max_cost_per_hour = CostPolicy::for_plan(plan).max_cost_per_hour;
    let current_cost = state.costs.current_cost(&user_id).await;
    let cost = CostStatusResponse {
        current_cost,
        max_cost_per_hour,
        remaining_cost: (max_cost_per_hour - current_cost).max(0.0),
    };

    Ok(Json(
        RateLimitStatusResponse::new(Decision::from(&outcome), outcome.result()).with_cost(cost),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// DELETE /api/admin/rate-limit/users/:user_id - Restore a user's quota
pub async fn reset_user(
    State(state): State<RateLimitAppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.authorize_admin(&headers)?;
    state.rate_limits.reset_user_rate_limit(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/admin/rate-limit/ips/:ip - Restore an address's quota
pub async fn reset_ip(
    State(state): State<RateLimitAppState>,
    headers: HeaderMap,
    Path(ip): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.authorize_admin(&headers)?;
    state.rate_limits.reset_ip_rate_limit(&ip).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// Usage Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/usage/cost/check - Reserve estimated spend
///
/// The ceiling comes from the gateway-set `X-User-Plan`. Answers 429
/// `COST_LIMIT_EXCEEDED` when the estimate does not fit in the remaining
/// hourly budget.
pub async fn check_cost(
    State(state): State<RateLimitAppState>,
    caller: Caller,
    Json(request): Json<CostCheckRequest>,
) -> Result<Response, ApiError> {
    let user_id = require_user(&caller)?;
    let plan = require_plan(&caller)?;
    let outcome = state
        .costs
        .check_cost_rate_limit(user_id, plan, request.estimated_cost)
        .await?;

    let decision = Decision::from(&outcome);
    let response = match outcome {
        LimitOutcome::Denied(result) => {
            tracing::info!(user_id, plan, "Request rejected by cost limit");
            let body = ErrorResponse::with_details(
                ErrorCode::CostLimited.to_string(),
                "Hourly cost limit reached for your plan",
                serde_json::json!({
                    "current_cost": result.current_cost,
                    "remaining_cost": result.remaining_cost,
                    "max_cost_per_hour": result.max_cost_per_hour,
                    "resets_at": result.resets_at.as_unix_secs(),
                }),
            );
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
        LimitOutcome::Allowed(result) | LimitOutcome::Indeterminate(result) => {
            Json(CostCheckResponse::new(decision, &result)).into_response()
        }
    };
    Ok(response)
}

/// POST /api/usage/cost/record - Record actual spend
pub async fn record_cost(
    State(state): State<RateLimitAppState>,
    caller: Caller,
    Json(request): Json<CostRecordRequest>,
) -> Result<Json<CostRecordResponse>, ApiError> {
    let user_id = require_user(&caller)?;
    state.costs.record_cost(user_id, request.cost).await?;

    let user_id = UserId::new(user_id).map_err(RateLimitError::from)?;
    Ok(Json(CostRecordResponse {
        recorded: request.cost,
        current_cost: state.costs.current_cost(&user_id).await,
    }))
}

fn require_user(caller: &Caller) -> Result<&str, ApiError> {
    caller
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("X-User-Id header is required"))
}

fn require_plan(caller: &Caller) -> Result<&str, ApiError> {
    caller
        .plan()
        .ok_or_else(|| ApiError::unauthorized("X-User-Plan header is required"))
}
