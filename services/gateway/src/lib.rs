//! Roadside Gateway
//!
//! Realtime and pricing edge of the roadside-assistance platform.
//! Features:
//! - Authenticated WebSocket sessions with per-user, provider and admin fan-out
//! - Time-of-day price quotes with storm-mode surges
//! - Trust-tier gating of card payments with audited bypass attempts
//! - JWT authentication middleware
//! - Fixed-window rate limiting and monitoring

#![allow(missing_docs)]

use anyhow::Result;
use std::sync::Arc;

pub mod config;
pub mod dispatcher;
pub mod geo;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod rate_limiter;
pub mod registry;
pub mod server;
pub mod store;
pub mod trust_tier;
pub mod websocket;

pub use config::{AuthConfig, CorsConfig, GatewayConfig, RateLimitConfig, ServerConfig};
pub use server::{ApiGatewayServer, GatewayComponents};

/// Start the gateway against the in-memory store seeded with demo data
pub async fn start_server(config: GatewayConfig) -> Result<()> {
    let store = Arc::new(store::InMemoryStore::with_demo_data());
    let components = GatewayComponents::new(&config, store)?;
    ApiGatewayServer::new(config, components).start().await
}
