//! REST API models and request/response types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use roadside_common::{ServiceError, WsEvent};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    dispatcher::Audience, geo::GeoPoint, pricing::PricingError, rate_limiter::RateLimitStats,
    trust_tier::TrustTierError,
};

/// Pricing models
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub service_id: String,
    /// RFC 3339; defaults to now
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StormModeRequest {
    pub template_name: String,
    /// Basis points
    pub multiplier: i64,
}

/// Payment models
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPaymentRequest {
    pub booking_id: String,
    /// Minor currency units
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPaymentResponse {
    pub booking_id: String,
    pub amount: i64,
    /// The card charge itself is made by the payment collaborator
    pub authorized: bool,
}

/// Realtime dispatch models
#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchEventRequest {
    pub audience: Audience,
    pub event: WsEvent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchEventResponse {
    /// Sockets the event was handed to
    pub reached: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLocationRequest {
    pub provider_id: String,
    pub lat: f64,
    pub lng: f64,
    /// Where the provider is headed, if on a job
    pub destination: Option<GeoPoint>,
    /// Customer following this provider
    pub customer_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLocationResponse {
    pub eta_minutes: Option<u32>,
    pub distance_meters: Option<i64>,
    pub reached: usize,
}

/// Body of trust-tier guard rejections
#[derive(Debug, Serialize, Deserialize)]
pub struct GuardRejection {
    pub error: String,
}

/// Error response model
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    pub details: Option<FxHashMap<String, String>>,
}

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error details (if failed)
    pub error: Option<ErrorResponse>,
    /// Response timestamp
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    /// Create a successful API response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Create an error API response
    #[must_use]
    pub fn error(error: ErrorResponse) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Handler error carrying the service taxonomy onto the wire
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        Self(err.into())
    }
}

impl From<TrustTierError> for ApiError {
    fn from(err: TrustTierError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_server_fault() {
            error!("Request failed with server fault: {}", self.0);
        }

        let body = ApiResponse::<()>::error(ErrorResponse {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
            details: None,
        });
        (status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Registered realtime connections
    pub connections: usize,
    /// Whether a storm surge is in effect
    pub storm_mode_active: bool,
    pub rate_limiting: RateLimitStats,
    /// Service version
    pub version: String,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}
