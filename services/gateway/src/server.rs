//! Gateway server: shared components, routes and middleware stack

use anyhow::{Context, Result, anyhow};
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::{get, post},
};
use chrono::FixedOffset;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    config::GatewayConfig,
    dispatcher::EventDispatcher,
    handlers::{HealthHandlers, PaymentHandlers, PricingHandlers, RealtimeHandlers},
    metrics,
    middleware::{
        AuthState, RateLimitState, TrustGuardState, auth_middleware, create_cors_layer,
        logging_middleware, rate_limit_middleware, trust_tier_guard,
    },
    pricing::PricingEngine,
    rate_limiter::RateLimiter,
    registry::ConnectionRegistry,
    store::{AuditSink, ServiceRepository, SettingsRepository, TimeBlockRepository, UserRepository},
    trust_tier::TrustTierService,
    websocket::SessionServer,
};

/// Everything the routes share, built once per process
#[derive(Clone)]
pub struct GatewayComponents {
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<EventDispatcher>,
    pub pricing: Arc<PricingEngine>,
    pub trust_tier: Arc<TrustTierService>,
    pub sessions: Arc<SessionServer>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl GatewayComponents {
    /// Wire every component against one backing store
    pub fn new<S>(config: &GatewayConfig, store: Arc<S>) -> Result<Self>
    where
        S: ServiceRepository
            + TimeBlockRepository
            + UserRepository
            + SettingsRepository
            + AuditSink
            + 'static,
    {
        let offset = FixedOffset::east_opt(config.pricing.utc_offset_seconds).ok_or_else(|| {
            anyhow!(
                "Invalid pricing UTC offset: {}s",
                config.pricing.utc_offset_seconds
            )
        })?;

        let registry = Arc::new(ConnectionRegistry::new());
        let pricing = PricingEngine::new(
            Arc::clone(&store) as Arc<dyn ServiceRepository>,
            Arc::clone(&store) as Arc<dyn TimeBlockRepository>,
            offset,
        );
        let trust_tier = TrustTierService::new(
            Arc::clone(&store) as Arc<dyn UserRepository>,
            Arc::clone(&store) as Arc<dyn SettingsRepository>,
            store as Arc<dyn AuditSink>,
            config.trust_tier.default_promotion_threshold,
        );

        Ok(Self {
            dispatcher: Arc::new(EventDispatcher::new(Arc::clone(&registry))),
            sessions: Arc::new(SessionServer::new(
                Arc::clone(&registry),
                config.websocket.clone(),
            )),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limiting.clone())),
            pricing: Arc::new(pricing),
            trust_tier: Arc::new(trust_tier),
            registry,
        })
    }
}

/// Unified application state containing all handlers
#[derive(Clone)]
pub struct AppState {
    pub health_handlers: HealthHandlers,
    pub pricing_handlers: PricingHandlers,
    pub payment_handlers: PaymentHandlers,
    pub realtime_handlers: RealtimeHandlers,
    pub sessions: Arc<SessionServer>,
}

impl FromRef<AppState> for HealthHandlers {
    fn from_ref(state: &AppState) -> Self {
        state.health_handlers.clone()
    }
}

impl FromRef<AppState> for PricingHandlers {
    fn from_ref(state: &AppState) -> Self {
        state.pricing_handlers.clone()
    }
}

impl FromRef<AppState> for PaymentHandlers {
    fn from_ref(state: &AppState) -> Self {
        state.payment_handlers.clone()
    }
}

impl FromRef<AppState> for RealtimeHandlers {
    fn from_ref(state: &AppState) -> Self {
        state.realtime_handlers.clone()
    }
}

impl FromRef<AppState> for Arc<SessionServer> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sessions)
    }
}

/// Gateway server
pub struct ApiGatewayServer {
    config: GatewayConfig,
    components: GatewayComponents,
    start_time: Instant,
}

impl ApiGatewayServer {
    pub fn new(config: GatewayConfig, components: GatewayComponents) -> Self {
        if config.monitoring.metrics_enabled {
            metrics::register_metrics();
        }
        info!("Gateway server initialized");

        Self {
            config,
            components,
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub const fn components(&self) -> &GatewayComponents {
        &self.components
    }

    /// Bind the configured address and serve until the process stops
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .server_address()
            .parse()
            .with_context(|| format!("Invalid server address '{}'", self.config.server_address()))?;

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("TCP listener bound successfully to {}", addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind TCP listener to {}: {}", addr, e);
                return Err(anyhow!("Failed to bind to address {}: {}", addr, e));
            }
        };

        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let sweeper = Arc::clone(&self.components.rate_limiter).spawn_sweeper();
        let app = self.router();

        info!(
            "Gateway listening on {}",
            listener.local_addr().context("listener has no local address")?
        );
        let result = axum::serve(listener, app).await;
        sweeper.abort();

        result.map_err(|e| {
            error!("Server encountered a fatal error: {}", e);
            anyhow!("Server error: {}", e)
        })
    }

    /// Build the Axum application with all routes and middleware
    pub fn router(&self) -> Router {
        let components = &self.components;
        let app_state = AppState {
            health_handlers: HealthHandlers::new(
                Arc::clone(&components.registry),
                Arc::clone(&components.pricing),
                Arc::clone(&components.rate_limiter),
                self.start_time,
            ),
            pricing_handlers: PricingHandlers::new(
                Arc::clone(&components.pricing),
                Arc::clone(&components.dispatcher),
            ),
            payment_handlers: PaymentHandlers::new(Arc::clone(&components.trust_tier)),
            realtime_handlers: RealtimeHandlers::new(Arc::clone(&components.dispatcher)),
            sessions: Arc::clone(&components.sessions),
        };

        let auth_state = AuthState {
            config: Arc::new(self.config.clone()),
        };
        let rate_limit_state = RateLimitState {
            limiter: Arc::clone(&components.rate_limiter),
        };
        let guard_state = TrustGuardState {
            trust_tier: Arc::clone(&components.trust_tier),
        };

        let app = Router::new()
            // Health and realtime upgrade (no bearer token)
            .route(
                &self.config.monitoring.health_path,
                get(HealthHandlers::health_check),
            )
            .route(&self.config.websocket.path, get(SessionServer::handle_upgrade))
            // Pricing
            .route("/api/v1/pricing/quote", get(PricingHandlers::quote))
            .route(
                "/api/v1/admin/storm-mode",
                post(PricingHandlers::activate_storm_mode)
                    .delete(PricingHandlers::deactivate_storm_mode),
            )
            // Payments
            .route(
                "/api/v1/trust-tier",
                get(PaymentHandlers::trust_tier_status),
            )
            .route(
                "/api/v1/payments/card/confirm",
                post(PaymentHandlers::confirm_card_payment).route_layer(
                    middleware::from_fn_with_state(guard_state, trust_tier_guard),
                ),
            )
            // Backend-to-gateway event intake
            .route(
                "/api/v1/internal/events",
                post(RealtimeHandlers::dispatch_event),
            )
            .route(
                "/api/v1/internal/provider-location",
                post(RealtimeHandlers::provider_location),
            )
            .with_state(app_state)
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size))
            .layer(TimeoutLayer::new(std::time::Duration::from_secs(
                self.config.server.timeout_seconds,
            )))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
            .layer(middleware::from_fn_with_state(
                rate_limit_state,
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn(logging_middleware))
            .layer(TraceLayer::new_for_http());

        let app = if self.config.server.compression {
            app.layer(CompressionLayer::new())
        } else {
            app
        };

        if self.config.cors.enabled {
            app.layer(create_cors_layer(&self.config))
        } else {
            app
        }
    }
}

/// API route documentation
pub fn print_routes() {
    println!("Roadside Gateway Routes:");
    println!("========================");
    println!();
    println!("Health & Realtime:");
    println!("  GET    /health                           - Health check");
    println!("  GET    /ws                               - Realtime WebSocket (auth frame required)");
    println!();
    println!("Pricing:");
    println!("  GET    /api/v1/pricing/quote             - Quote a service (serviceId, scheduledAt)");
    println!("  POST   /api/v1/admin/storm-mode          - Activate storm mode (admin)");
    println!("  DELETE /api/v1/admin/storm-mode          - Deactivate storm mode (admin)");
    println!();
    println!("Payments:");
    println!("  GET    /api/v1/trust-tier                - Caller's trust tier status");
    println!("  POST   /api/v1/payments/card/confirm     - Card payment (trust tier 2 only)");
    println!();
    println!("Internal:");
    println!("  POST   /api/v1/internal/events           - Dispatch a realtime event (admin)");
    println!("  POST   /api/v1/internal/provider-location - Relay provider position (provider)");
    println!();
    println!("All endpoints except /health and /ws require a bearer JWT.");
}
