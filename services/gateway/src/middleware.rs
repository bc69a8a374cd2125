//! Middleware for authentication, rate limiting, trust-tier gating and monitoring

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use roadside_common::{PaymentMethod, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::metrics;
use crate::models::{ApiResponse, ErrorResponse, GuardRejection};
use crate::rate_limiter::RateLimiter;
use crate::trust_tier::{CARD_PAYMENT_RESTRICTED, PaymentAttempt, TrustTierError, TrustTierService};
use rustc_hash::FxHashMap;

const UNKNOWN_CLIENT: &str = "unknown";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

/// Caller identity established by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    pub role: Role,
    pub expires_at: usize,
}

/// Client address and agent, for audit records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub ip_address: String,
    pub user_agent: String,
}

/// Authentication middleware state
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<GatewayConfig>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &"Arc<GatewayConfig>")
            .finish()
    }
}

/// Rate limiting middleware state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitState")
            .field("limiter", &"Arc<RateLimiter>")
            .finish()
    }
}

/// Card payment guard state
#[derive(Clone)]
pub struct TrustGuardState {
    pub trust_tier: Arc<TrustTierService>,
}

/// Create standardized error response
fn create_error_response(
    error_code: &str,
    message: &str,
    details: Option<FxHashMap<String, String>>,
) -> ErrorResponse {
    ErrorResponse {
        error: error_code.to_string(),
        message: message.to_string(),
        details,
    }
}

fn unauthorized(error_code: &str, message: &str, client_ip: String) -> Response {
    let error_response = create_error_response(
        error_code,
        message,
        Some([("client_ip".to_string(), client_ip)].into_iter().collect()),
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(error_response)),
    )
        .into_response()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let path = request.uri().path();
    if is_public_endpoint(path, &auth_state.config) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        let client_ip = get_client_ip(request.headers());
        warn!(client_ip = %client_ip, "Missing or invalid Authorization header");
        return Err(unauthorized(
            "missing_token",
            "Authorization header missing or invalid format",
            client_ip,
        ));
    };

    let decoding_key = DecodingKey::from_secret(auth_state.config.auth.jwt_secret.as_bytes());
    match decode::<Claims>(token, &decoding_key, &Validation::default()) {
        Ok(token_data) => {
            let claims = token_data.claims;
            request.extensions_mut().insert(UserContext {
                user_id: claims.sub,
                role: claims.role,
                expires_at: claims.exp,
            });
            Ok(next.run(request).await)
        }
        Err(e) => {
            let client_ip = get_client_ip(request.headers());
            warn!(client_ip = %client_ip, "JWT validation failed: {}", e);
            Err(unauthorized(
                "authentication_failed",
                "Invalid or expired JWT token",
                client_ip,
            ))
        }
    }
}

/// Fixed-window rate limiting keyed by client address and path
pub async fn rate_limit_middleware(
    State(rate_limit_state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let client_ip = get_client_ip(request.headers());
    let path = request.uri().path().to_string();

    let decision = rate_limit_state.limiter.check_request(&client_ip, &path);
    if !decision.allowed {
        warn!(
            client_ip = %client_ip,
            path = %path,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();

        let error_response = create_error_response(
            "rate_limit_exceeded",
            "Too many requests, please try again later",
            Some(
                [
                    ("client_ip".to_string(), client_ip),
                    ("path".to_string(), path),
                ]
                .into_iter()
                .collect(),
            ),
        );

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error(error_response)),
        )
            .into_response();
        let headers = response.headers_mut();
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), decision.limit.into());
        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), 0u32.into());
        headers.insert(header::RETRY_AFTER, decision.reset.as_secs().max(1).into());
        return Err(response);
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), decision.limit.into());
    headers.insert(HeaderName::from_static("x-ratelimit-remaining"), decision.remaining.into());
    Ok(response)
}

/// Reject card payments from users whose current tier does not allow them.
///
/// Must run after [`auth_middleware`]. The downstream handler is only
/// reached when the user exists and is tier 2 or above.
pub async fn trust_tier_guard(
    State(guard): State<TrustGuardState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user_id) = request
        .extensions()
        .get::<UserContext>()
        .map(|ctx| ctx.user_id.clone())
    else {
        return guard_rejection(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let attempt = PaymentAttempt {
        method: PaymentMethod::Stripe,
        endpoint: request.uri().path().to_string(),
        request_info: request_info(request.headers()),
    };

    match guard.trust_tier.authorize_payment(&user_id, attempt).await {
        Ok(user) => {
            debug!(user_id = %user.id, tier = user.trust_tier, "Card payment allowed");
            next.run(request).await
        }
        Err(TrustTierError::Unauthorized) => {
            guard_rejection(StatusCode::UNAUTHORIZED, "Unauthorized")
        }
        Err(TrustTierError::RestrictedMethod { .. }) => {
            guard_rejection(StatusCode::FORBIDDEN, CARD_PAYMENT_RESTRICTED)
        }
        Err(TrustTierError::Store(e)) => {
            warn!(user_id = %user_id, "Trust tier lookup failed: {}", e);
            guard_rejection(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn guard_rejection(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(GuardRejection {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(request.headers());

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = duration.as_millis(),
        client_ip = %client_ip,
        "Request processed"
    );

    response
}

/// CORS layer factory
pub fn create_cors_layer(config: &GatewayConfig) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .max_age(std::time::Duration::from_secs(config.cors.max_age_seconds));

    // Credentials cannot be combined with a wildcard origin
    if config.cors.allowed_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_origin(tower_http::cors::Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        cors = cors
            .allow_origin(origins)
            .allow_credentials(config.cors.allow_credentials);
    }

    let methods: Result<Vec<_>, _> = config
        .cors
        .allowed_methods
        .iter()
        .map(|method| method.parse())
        .collect();
    if let Ok(methods) = methods {
        cors = cors.allow_methods(methods);
    }

    let headers: Result<Vec<_>, _> = config
        .cors
        .allowed_headers
        .iter()
        .map(|header| header.parse())
        .collect();
    if let Ok(headers) = headers {
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Endpoints reachable without a bearer token. The realtime socket runs its
/// own auth handshake.
fn is_public_endpoint(path: &str, config: &GatewayConfig) -> bool {
    path == config.monitoring.health_path || path == config.websocket.path
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`
#[must_use]
pub fn get_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded_for) = headers.get("X-Forwarded-For")
        && let Ok(forwarded_str) = forwarded_for.to_str()
        && let Some(first_ip) = forwarded_str.split(',').next()
        && !first_ip.trim().is_empty()
    {
        return first_ip.trim().to_string();
    }

    if let Some(real_ip) = headers.get("X-Real-IP")
        && let Ok(real_ip_str) = real_ip.to_str()
    {
        return real_ip_str.trim().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

/// Address and user agent of the caller
#[must_use]
pub fn request_info(headers: &HeaderMap) -> RequestInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string();

    RequestInfo {
        ip_address: get_client_ip(headers),
        user_agent,
    }
}

/// Role checking helper. Admins pass every check.
#[must_use]
pub fn check_role(user_context: &UserContext, required: Role) -> bool {
    user_context.role == Role::Admin || user_context.role == required
}
