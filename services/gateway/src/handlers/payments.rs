//! Card payment confirmation and trust-tier status

use axum::{Extension, extract::State, response::Json};
use std::sync::Arc;
use tracing::info;

use crate::{
    middleware::UserContext,
    models::{ApiError, ApiResponse, CardPaymentRequest, CardPaymentResponse},
    trust_tier::{TrustTierService, TrustTierStatus},
};

#[derive(Clone)]
pub struct PaymentHandlers {
    trust_tier: Arc<TrustTierService>,
}

impl PaymentHandlers {
    pub fn new(trust_tier: Arc<TrustTierService>) -> Self {
        Self { trust_tier }
    }

    /// Only reached through the trust-tier guard
    pub async fn confirm_card_payment(
        Extension(user): Extension<UserContext>,
        Json(request): Json<CardPaymentRequest>,
    ) -> Json<ApiResponse<CardPaymentResponse>> {
        info!(
            user_id = %user.user_id,
            booking_id = %request.booking_id,
            amount = request.amount,
            "Card payment authorized"
        );
        Json(ApiResponse::success(CardPaymentResponse {
            booking_id: request.booking_id,
            amount: request.amount,
            authorized: true,
        }))
    }

    /// Caller's tier, progress toward promotion and allowed methods
    pub async fn trust_tier_status(
        State(handlers): State<Self>,
        Extension(user): Extension<UserContext>,
    ) -> Result<Json<ApiResponse<TrustTierStatus>>, ApiError> {
        let status = handlers.trust_tier.status(&user.user_id).await?;
        Ok(Json(ApiResponse::success(status)))
    }
}
