//! Configuration for the dispatch gateway

use anyhow::Result;
use roadside_common::{
    AUTH_TIMEOUT_CLOSE_CODE, AUTH_TIMEOUT_MS, DEFAULT_PROMOTION_THRESHOLD, HEARTBEAT_INTERVAL_MS,
    OUTBOUND_QUEUE_CAPACITY, WS_PATH,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::rate_limiter::RateLimitPreset;

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Rate limiting configuration
    pub rate_limiting: RateLimitConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
    /// Realtime session configuration
    pub websocket: WebSocketConfig,
    /// Pricing engine configuration
    pub pricing: PricingConfig,
    /// Trust tier configuration
    pub trust_tier: TrustTierConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable compression
    pub compression: bool,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret used to verify session tokens (HS256)
    pub jwt_secret: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Preset applied to paths with no endpoint entry
    pub default_preset: RateLimitPreset,
    /// Path prefix to preset
    pub endpoint_limits: FxHashMap<String, RateLimitPreset>,
    /// How often expired windows are swept
    pub sweep_interval_seconds: u64,
    /// Upper bound on tracked keys
    pub max_tracked_keys: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Allow credentials
    pub allow_credentials: bool,
    /// Max age for preflight requests
    pub max_age_seconds: u64,
}

/// Monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Record metrics through the `metrics` facade
    pub metrics_enabled: bool,
    /// Health check endpoint path
    pub health_path: String,
}

/// Realtime session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// The single route accepting upgrades
    pub path: String,
    /// How long a socket may stay unauthenticated
    pub auth_timeout_ms: u64,
    /// Interval between protocol pings
    pub heartbeat_interval_ms: u64,
    /// Close code for sockets that never authenticate
    pub auth_timeout_close_code: u16,
    /// Frames queued per socket before further sends are dropped
    pub outbound_queue_capacity: usize,
}

impl WebSocketConfig {
    #[must_use]
    pub const fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Pricing engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Offset of the local clock that time blocks are written against
    pub utc_offset_seconds: i32,
}

/// Trust tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustTierConfig {
    /// Used when the platform setting is absent or unparsable
    pub default_promotion_threshold: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut endpoint_limits = FxHashMap::default();
        endpoint_limits.insert("/api/v1/auth".to_string(), RateLimitPreset::Auth);
        endpoint_limits.insert("/api/v1/payments".to_string(), RateLimitPreset::Strict);
        endpoint_limits.insert("/api/v1/internal".to_string(), RateLimitPreset::Webhooks);
        endpoint_limits.insert(
            "/api/v1/notifications".to_string(),
            RateLimitPreset::Notifications,
        );

        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                timeout_seconds: 30,
                max_body_size: 1024 * 1024, // 1MB
                compression: true,
            },
            auth: AuthConfig {
                jwt_secret: "change-me".to_string(),
            },
            rate_limiting: RateLimitConfig {
                enabled: true,
                default_preset: RateLimitPreset::Standard,
                endpoint_limits,
                sweep_interval_seconds: 60,
                max_tracked_keys: 10_000,
            },
            cors: CorsConfig {
                enabled: true,
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec![
                    "GET".to_string(),
                    "POST".to_string(),
                    "DELETE".to_string(),
                    "OPTIONS".to_string(),
                ],
                allowed_headers: vec![
                    "Authorization".to_string(),
                    "Content-Type".to_string(),
                ],
                allow_credentials: false,
                max_age_seconds: 86400, // 24 hours
            },
            monitoring: MonitoringConfig {
                metrics_enabled: true,
                health_path: "/health".to_string(),
            },
            websocket: WebSocketConfig {
                path: WS_PATH.to_string(),
                auth_timeout_ms: AUTH_TIMEOUT_MS,
                heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
                auth_timeout_close_code: AUTH_TIMEOUT_CLOSE_CODE,
                outbound_queue_capacity: OUTBOUND_QUEUE_CAPACITY,
            },
            pricing: PricingConfig {
                utc_offset_seconds: 0,
            },
            trust_tier: TrustTierConfig {
                default_promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
            },
        }
    }
}

impl GatewayConfig {
    /// Load configuration from file, layered with `GATEWAY__*` environment variables
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Get server address
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
