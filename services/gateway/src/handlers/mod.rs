//! API handlers grouped by concern

pub mod health;
pub mod payments;
pub mod pricing;
pub mod realtime;

pub use health::HealthHandlers;
pub use payments::PaymentHandlers;
pub use pricing::PricingHandlers;
pub use realtime::RealtimeHandlers;

use roadside_common::{Role, ServiceError};

use crate::middleware::{UserContext, check_role};
use crate::models::ApiError;

/// Fail with 403 unless the caller holds `required` (or is an admin)
pub(crate) fn require_role(user: &UserContext, required: Role) -> Result<(), ApiError> {
    if check_role(user, required) {
        Ok(())
    } else {
        Err(ApiError(ServiceError::Forbidden(format!(
            "{} role required",
            required
        ))))
    }
}
