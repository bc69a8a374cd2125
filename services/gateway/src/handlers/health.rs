//! Health check handler

use axum::{extract::State, response::Json};
use std::{sync::Arc, time::Instant};
use tracing::debug;

use crate::{
    models::{ApiResponse, HealthCheckResponse},
    pricing::PricingEngine,
    rate_limiter::RateLimiter,
    registry::ConnectionRegistry,
};

/// Health check handlers
#[derive(Clone)]
pub struct HealthHandlers {
    registry: Arc<ConnectionRegistry>,
    pricing: Arc<PricingEngine>,
    rate_limiter: Arc<RateLimiter>,
    start_time: Instant,
}

impl HealthHandlers {
    pub const fn new(
        registry: Arc<ConnectionRegistry>,
        pricing: Arc<PricingEngine>,
        rate_limiter: Arc<RateLimiter>,
        start_time: Instant,
    ) -> Self {
        Self {
            registry,
            pricing,
            rate_limiter,
            start_time,
        }
    }

    /// Health check endpoint
    pub async fn health_check(
        State(handlers): State<Self>,
    ) -> Json<ApiResponse<HealthCheckResponse>> {
        debug!("Health check request");

        Json(ApiResponse::success(HealthCheckResponse {
            status: "healthy".to_string(),
            connections: handlers.registry.connection_count(),
            storm_mode_active: handlers.pricing.storm_mode().is_some(),
            rate_limiting: handlers.rate_limiter.get_stats(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: handlers.start_time.elapsed().as_secs(),
        }))
    }
}
