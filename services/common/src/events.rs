//! Realtime wire protocol
//!
//! Every frame is a JSON text message. Server-to-client frames carry a
//! `type` discriminant and, for domain events, a `data` payload:
//!
//! ```json
//! {"type":"booking:status_changed","data":{"bookingId":"b-1","status":"en_route"}}
//! ```
//!
//! The only client-to-server frame is the auth handshake.

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Messages a client may send to the session server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "auth")]
    Auth {
        #[serde(rename = "userId")]
        user_id: String,
        role: Role,
    },
}

impl ClientMessage {
    #[must_use]
    pub fn auth(user_id: impl Into<String>, role: Role) -> Self {
        Self::Auth {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Messages the session server pushes to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum WsEvent {
    /// Handshake acknowledgment; never dispatched as a domain event
    #[serde(rename = "auth:success")]
    AuthSuccess,

    #[serde(rename = "booking:created")]
    BookingCreated {
        booking_id: String,
        contact_name: String,
        status: String,
        service_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        b2b_account_id: Option<String>,
    },

    #[serde(rename = "booking:status_changed")]
    BookingStatusChanged { booking_id: String, status: String },

    #[serde(rename = "provider:job_assigned")]
    ProviderJobAssigned {
        booking_id: String,
        provider_id: String,
        contact_name: String,
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_name: Option<String>,
        /// Minor currency units
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_price: Option<i64>,
        /// Minor currency units
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_payout: Option<i64>,
    },

    #[serde(rename = "provider:location_updated")]
    ProviderLocationUpdated {
        provider_id: String,
        lat: f64,
        lng: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eta_minutes: Option<u32>,
    },

    #[serde(rename = "storm_mode:activated")]
    StormModeActivated {
        template_name: String,
        /// Basis points
        multiplier: i64,
        activated_by: String,
    },

    #[serde(rename = "storm_mode:deactivated")]
    StormModeDeactivated { deactivated_by: String },

    #[serde(rename = "booking:price_override")]
    BookingPriceOverride { booking_id: String },

    #[serde(rename = "service:commission_updated")]
    ServiceCommissionUpdated {
        service_id: String,
        /// Basis points
        commission_rate: i64,
    },

    #[serde(rename = "payout:batch_paid")]
    PayoutBatchPaid { payout_ids: Vec<String>, count: usize },

    #[serde(rename = "payment:refunded")]
    PaymentRefunded {
        payment_id: String,
        booking_id: String,
        refund_type: String,
        /// Minor currency units
        refund_amount: i64,
    },
}

impl WsEvent {
    /// Wire discriminant of this event
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthSuccess => "auth:success",
            Self::BookingCreated { .. } => "booking:created",
            Self::BookingStatusChanged { .. } => "booking:status_changed",
            Self::ProviderJobAssigned { .. } => "provider:job_assigned",
            Self::ProviderLocationUpdated { .. } => "provider:location_updated",
            Self::StormModeActivated { .. } => "storm_mode:activated",
            Self::StormModeDeactivated { .. } => "storm_mode:deactivated",
            Self::BookingPriceOverride { .. } => "booking:price_override",
            Self::ServiceCommissionUpdated { .. } => "service:commission_updated",
            Self::PayoutBatchPaid { .. } => "payout:batch_paid",
            Self::PaymentRefunded { .. } => "payment:refunded",
        }
    }

    /// Serialize to a text frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a text frame. Returns `None` for anything that is not a known event.
    #[must_use]
    pub fn from_frame(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
