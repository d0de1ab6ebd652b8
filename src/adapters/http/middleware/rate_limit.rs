//! Rate limiting middleware for axum.
//!
//! Each request is counted against exactly one quota: the caller's plan
//! when `X-User-Id` and a recognized `X-User-Plan` are both present, and
//! the client address otherwise.
//!
//! Rate limit status is returned in standard HTTP headers:
//! - `X-RateLimit-Limit`: Maximum requests allowed in the window
//! - `X-RateLimit-Remaining`: Requests remaining in the current window
//! - `X-RateLimit-Reset`: Unix timestamp when the window resets
//! - `Retry-After`: Seconds to wait (only on 429 response)
//!
//! When the cache cannot be reached the request passes without headers.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::post, middleware};
//!
//! let app = Router::new()
//!     .route("/api/analyze", post(handler))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
//!     .with_state(state);
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::adapters::http::rate_limit::RateLimitAppState;
use crate::application::RateLimitManager;
use crate::domain::foundation::{ClientIp, ErrorCode, Timestamp};
use crate::domain::rate_limit::{LimitOutcome, RateLimitResult};

/// Header carrying the authenticated user's id.
pub static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
/// Header carrying the authenticated user's plan.
pub static X_USER_PLAN: HeaderName = HeaderName::from_static("x-user-plan");

/// Who is making a request, as far as rate limiting is concerned.
///
/// Identity headers are set by the upstream gateway after authentication;
/// this service does not verify them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub plan: Option<String>,
    pub ip: ClientIp,
}

impl Caller {
    /// Resolve the caller from request headers and connection info.
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let connect_info = extensions.get::<ConnectInfo<SocketAddr>>();
        let ip = extract_client_ip(headers, connect_info)
            .and_then(|ip| ClientIp::new(ip).ok())
            .unwrap_or_else(ClientIp::unknown);

        Self {
            user_id: header_str(headers, &X_USER_ID),
            plan: header_str(headers, &X_USER_PLAN),
            ip,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller::resolve(&parts.headers, &parts.extensions))
    }
}

/// Rate limiting middleware.
///
/// Returns 429 Too Many Requests when the caller's quota is exhausted and
/// adds the rate limit headers to every other response.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitAppState>,
    request: Request,
    next: Next,
) -> Response {
    let caller = Caller::resolve(request.headers(), request.extensions());

    let outcome = match state
        .rate_limits
        .with_rate_limit(caller.user_id(), caller.plan(), caller.ip.as_str())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match outcome {
        LimitOutcome::Denied(result) => {
            tracing::info!(
                scope = %result.scope,
                tier = %result.tier,
                ip = %caller.ip,
                "Request rejected by rate limit"
            );
            rate_limit_response(&result, state.clock.now())
        }
        LimitOutcome::Allowed(result) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(&mut response, &result);
            response
        }
        LimitOutcome::Indeterminate(_) => next.run(request).await,
    }
}

/// Extract client IP from request headers, checking forwarded headers first.
///
/// Order of precedence:
/// 1. X-Forwarded-For header (first IP in list)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    // Take the first IP (client IP, before any proxies)
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    connect_info.map(|ci| ci.0.ip().to_string())
}

/// Create a 429 Too Many Requests response.
fn rate_limit_response(result: &RateLimitResult, now: Timestamp) -> Response {
    let retry_after_secs = result.retry_after_secs(now);
    let body = ErrorResponse::with_details(
        ErrorCode::RateLimited.to_string(),
        result.message,
        serde_json::json!({
            "limit": result.limit,
            "remaining": result.remaining,
            "reset_at": result.reset_at.as_unix_secs(),
            "retry_after_secs": retry_after_secs,
            "scope": result.scope,
            "tier": result.tier,
        }),
    );

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    add_rate_limit_headers(&mut response, result);
    response
        .headers_mut()
        .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

/// Add rate limit headers to a response.
fn add_rate_limit_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    for (name, value) in RateLimitManager::get_rate_limit_headers(result) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rate_limit::{LimitTier, RateLimitScope};
    use std::net::{IpAddr, Ipv4Addr};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            map.insert(name, HeaderValue::from_static(value));
        }
        map
    }

    fn denied_result() -> RateLimitResult {
        RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_at: Timestamp::from_unix_secs(1_705_316_400),
            limit: 10,
            count: 11,
            scope: RateLimitScope::User,
            tier: LimitTier::Free,
            message: "Free plan limit reached. Upgrade to Pro for more requests.",
        }
    }

    // ─── IP Extraction ───────────────────────────────────────────────

    #[test]
    fn extract_ip_from_x_forwarded_for() {
        let ip = extract_client_ip(&headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]), None);
        assert_eq!(ip, Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_ip_from_x_real_ip() {
        let ip = extract_client_ip(&headers(&[("x-real-ip", "9.8.7.6")]), None);
        assert_eq!(ip, Some("9.8.7.6".to_string()));
    }

    #[test]
    fn extract_ip_prefers_x_forwarded_for() {
        let ip = extract_client_ip(
            &headers(&[("x-forwarded-for", "1.2.3.4"), ("x-real-ip", "5.6.7.8")]),
            None,
        );
        assert_eq!(ip, Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_ip_skips_empty_forwarded_entry() {
        let ip = extract_client_ip(
            &headers(&[("x-forwarded-for", " , 1.2.3.4"), ("x-real-ip", "5.6.7.8")]),
            None,
        );
        assert_eq!(ip, Some("5.6.7.8".to_string()));
    }

    #[test]
    fn extract_ip_falls_back_to_socket_address() {
        let info = ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 4000));
        let ip = extract_client_ip(&HeaderMap::new(), Some(&info));
        assert_eq!(ip, Some("127.0.0.1".to_string()));
    }

    #[test]
    fn extract_ip_returns_none_without_sources() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }

    // ─── Caller ──────────────────────────────────────────────────────

    #[test]
    fn caller_reads_identity_headers() {
        let caller = Caller::resolve(
            &headers(&[("x-user-id", "u1"), ("x-user-plan", "PRO"), ("x-real-ip", "9.9.9.9")]),
            &Extensions::new(),
        );
        assert_eq!(caller.user_id(), Some("u1"));
        assert_eq!(caller.plan(), Some("PRO"));
        assert_eq!(caller.ip.as_str(), "9.9.9.9");
    }

    #[test]
    fn caller_without_address_is_unknown() {
        let caller = Caller::resolve(&HeaderMap::new(), &Extensions::new());
        assert_eq!(caller.user_id(), None);
        assert_eq!(caller.ip, ClientIp::unknown());
    }

    // ─── Responses ───────────────────────────────────────────────────

    #[test]
    fn rate_limit_response_has_429_status() {
        let response = rate_limit_response(&denied_result(), Timestamp::from_unix_secs(1_705_316_000));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn rate_limit_response_has_retry_after_header() {
        let response = rate_limit_response(&denied_result(), Timestamp::from_unix_secs(1_705_316_370));
        assert_eq!(response.headers().get("Retry-After").unwrap(), "30");
    }

    #[test]
    fn rate_limit_response_has_limit_headers() {
        let response = rate_limit_response(&denied_result(), Timestamp::from_unix_secs(1_705_316_000));
        let headers = response.headers();
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "10");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(headers.get("x-ratelimit-reset").unwrap(), "1705316400");
    }
}
