//! Internal endpoints backend services use to push realtime events

use axum::{Extension, extract::State, response::Json};
use roadside_common::{Role, ServiceError, WsEvent};
use tracing::warn;
use std::sync::Arc;

use super::require_role;
use crate::{
    dispatcher::{Audience, EventDispatcher},
    geo::{self, GeoPoint},
    middleware::UserContext,
    models::{
        ApiError, ApiResponse, DispatchEventRequest, DispatchEventResponse,
        ProviderLocationRequest, ProviderLocationResponse,
    },
};

#[derive(Clone)]
pub struct RealtimeHandlers {
    dispatcher: Arc<EventDispatcher>,
}

impl RealtimeHandlers {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Fan a domain event out to one audience
    pub async fn dispatch_event(
        State(handlers): State<Self>,
        Extension(user): Extension<UserContext>,
        Json(request): Json<DispatchEventRequest>,
    ) -> Result<Json<ApiResponse<DispatchEventResponse>>, ApiError> {
        require_role(&user, Role::Admin)?;

        let reached = handlers.dispatcher.dispatch(&request.audience, &request.event);
        Ok(Json(ApiResponse::success(DispatchEventResponse { reached })))
    }

    /// Relay a provider position to admins and the customer following it,
    /// with a straight-line ETA when the destination is known. Providers may
    /// only report for themselves; admins may report for anyone.
    pub async fn provider_location(
        State(handlers): State<Self>,
        Extension(user): Extension<UserContext>,
        Json(request): Json<ProviderLocationRequest>,
    ) -> Result<Json<ApiResponse<ProviderLocationResponse>>, ApiError> {
        require_role(&user, Role::Provider)?;
        if user.role != Role::Admin && request.provider_id != user.user_id {
            warn!(
                caller = %user.user_id,
                provider_id = %request.provider_id,
                "Rejected location update for another provider"
            );
            return Err(ApiError(ServiceError::Forbidden(
                "Providers may only report their own location".to_string(),
            )));
        }

        let (eta_minutes, distance_meters) = match request.destination {
            Some(dest) => {
                let here = GeoPoint::new(request.lat, request.lng);
                (
                    Some(geo::eta_minutes(request.lat, request.lng, dest.lat, dest.lng)),
                    Some(geo::miles_to_meters(geo::distance_miles(here, dest))),
                )
            }
            None => (None, None),
        };

        let event = WsEvent::ProviderLocationUpdated {
            provider_id: request.provider_id,
            lat: request.lat,
            lng: request.lng,
            eta_minutes,
        };

        let mut audiences = vec![Audience::Admins];
        if let Some(customer_id) = request.customer_id {
            audiences.push(Audience::User(customer_id));
        }
        let reached = handlers.dispatcher.dispatch_all(&audiences, &event);

        Ok(Json(ApiResponse::success(ProviderLocationResponse {
            eta_minutes,
            distance_meters,
            reached,
        })))
    }
}
