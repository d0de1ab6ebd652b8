//! Axum router configuration for rate limit endpoints.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::adapters::http::middleware::rate_limit_middleware;

use super::handlers::{
    check_cost, get_status, health, record_cost, reset_ip, reset_user, RateLimitAppState,
};

/// Create the usage router.
///
/// Only `/cost/check` is counted by the rate limit middleware. Recording
/// the spend of an already admitted operation is not a new request.
///
/// # Routes
/// - `POST /cost/check` - Reserve estimated spend
/// - `POST /cost/record` - Record actual spend
pub fn usage_routes(state: RateLimitAppState) -> Router<RateLimitAppState> {
    let metered = Router::new()
        .route("/cost/check", post(check_cost))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware));

    Router::new()
        .route("/cost/record", post(record_cost))
        .merge(metered)
}

/// Create the admin router. Requires `X-Admin-Token`.
///
/// # Routes
/// - `DELETE /users/:user_id` - Reset a user's request counter
/// - `DELETE /ips/:ip` - Reset an address's request counter
pub fn admin_routes() -> Router<RateLimitAppState> {
    Router::new()
        .route("/users/:user_id", delete(reset_user))
        .route("/ips/:ip", delete(reset_ip))
}

/// Create the complete application router.
///
/// Only the cost check is metered, so checking one's quota or recording
/// spend never consumes it.
///
/// # Example
///
/// ```ignore
/// let state = RateLimitAppState::new(cache, clock, config.server.admin_token.clone());
/// let app = rate_limit_router(state);
/// ```
pub fn rate_limit_router(state: RateLimitAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/rate-limit/status", get(get_status))
        .nest("/api/admin/rate-limit", admin_routes())
        .nest("/api/usage", usage_routes(state.clone()))
        .with_state(state)
}
