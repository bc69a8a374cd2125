//! Price quotes and storm-mode administration

use axum::{
    Extension,
    extract::{Query, State},
    response::Json,
};
use roadside_common::{Role, WsEvent};
use std::sync::Arc;
use tracing::info;

use super::require_role;
use crate::{
    dispatcher::{Audience, EventDispatcher},
    middleware::UserContext,
    models::{ApiError, ApiResponse, QuoteQuery, StormModeRequest},
    pricing::{PriceQuote, PricingEngine, StormMode},
};

/// Pricing handlers
#[derive(Clone)]
pub struct PricingHandlers {
    engine: Arc<PricingEngine>,
    dispatcher: Arc<EventDispatcher>,
}

impl PricingHandlers {
    pub fn new(engine: Arc<PricingEngine>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { engine, dispatcher }
    }

    /// Effective price of a service at the requested time
    pub async fn quote(
        State(handlers): State<Self>,
        Query(query): Query<QuoteQuery>,
    ) -> Result<Json<ApiResponse<PriceQuote>>, ApiError> {
        let quote = handlers
            .engine
            .quote_price(&query.service_id, query.scheduled_at)
            .await?;
        Ok(Json(ApiResponse::success(quote)))
    }

    /// Turn on a platform-wide surge and tell every admin
    pub async fn activate_storm_mode(
        State(handlers): State<Self>,
        Extension(user): Extension<UserContext>,
        Json(request): Json<StormModeRequest>,
    ) -> Result<Json<ApiResponse<StormMode>>, ApiError> {
        require_role(&user, Role::Admin)?;

        let storm =
            handlers
                .engine
                .activate_storm_mode(request.template_name, request.multiplier, &user.user_id)?;
        let event = WsEvent::StormModeActivated {
            template_name: storm.template_name.clone(),
            multiplier: storm.multiplier,
            activated_by: storm.activated_by.clone(),
        };
        let reached = handlers.dispatcher.dispatch(&Audience::Admins, &event);
        info!(reached, "Storm mode activation broadcast");

        Ok(Json(ApiResponse::success(storm)))
    }

    /// Turn off the surge, if one is active
    pub async fn deactivate_storm_mode(
        State(handlers): State<Self>,
        Extension(user): Extension<UserContext>,
    ) -> Result<Json<ApiResponse<Option<StormMode>>>, ApiError> {
        require_role(&user, Role::Admin)?;

        let previous = handlers.engine.deactivate_storm_mode(&user.user_id);
        if previous.is_some() {
            let event = WsEvent::StormModeDeactivated {
                deactivated_by: user.user_id.clone(),
            };
            handlers.dispatcher.dispatch(&Audience::Admins, &event);
        }

        Ok(Json(ApiResponse::success(previous)))
    }
}
