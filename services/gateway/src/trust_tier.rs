//! Trust tiers and the card-payment guard
//!
//! Tier 1 customers settle in cash, Cash App or Zelle. Tier 2 adds card
//! payments. Promotion from 1 to 2 happens elsewhere once the clean
//! transaction count reaches the platform threshold; this module only reads
//! the current tier, always from the user store.

use roadside_common::{
    BYPASS_ATTEMPT_ACTION, PROMOTION_THRESHOLD_SETTING, PaymentMethod, ServiceError,
    TRUST_TIER_FULL,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

use crate::metrics;
use crate::middleware::RequestInfo;
use crate::store::{AuditRecord, AuditSink, SettingsRepository, StoreError, User, UserRepository};

/// Rejection message for restricted users reaching a card endpoint
pub const CARD_PAYMENT_RESTRICTED: &str = "Trust Tier 1 users cannot use card payments";

/// Normalized trust tier. Anything below 2 is restricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Restricted,
    Full,
}

impl TrustTier {
    #[must_use]
    pub const fn from_level(level: i64) -> Self {
        if level >= TRUST_TIER_FULL {
            Self::Full
        } else {
            Self::Restricted
        }
    }
}

/// Payment methods open to a customer at `tier`. Defined for every integer.
#[must_use]
pub fn allowed_payment_methods(tier: i64) -> BTreeSet<PaymentMethod> {
    let mut methods: BTreeSet<_> = [PaymentMethod::Cash, PaymentMethod::Cashapp, PaymentMethod::Zelle]
        .into_iter()
        .collect();
    if TrustTier::from_level(tier) == TrustTier::Full {
        methods.insert(PaymentMethod::Stripe);
    }
    methods
}

#[derive(Debug, Error)]
pub enum TrustTierError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{}", CARD_PAYMENT_RESTRICTED)]
    RestrictedMethod { method: PaymentMethod },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TrustTierError> for ServiceError {
    fn from(err: TrustTierError) -> Self {
        match err {
            TrustTierError::Unauthorized => Self::Unauthorized(err.to_string()),
            TrustTierError::RestrictedMethod { .. } => Self::Forbidden(err.to_string()),
            TrustTierError::Store(store) => store.into(),
        }
    }
}

/// What the caller tried to do, for the audit trail
#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    pub method: PaymentMethod,
    pub endpoint: String,
    pub request_info: RequestInfo,
}

/// Where a customer stands relative to card eligibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustTierStatus {
    pub user_id: String,
    pub trust_tier: i64,
    pub clean_transaction_count: u32,
    pub promotion_threshold: u32,
    pub transactions_until_promotion: u32,
    pub allowed_payment_methods: BTreeSet<PaymentMethod>,
}

pub struct TrustTierService {
    users: Arc<dyn UserRepository>,
    settings: Arc<dyn SettingsRepository>,
    audit: Arc<dyn AuditSink>,
    default_promotion_threshold: u32,
}

impl TrustTierService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        settings: Arc<dyn SettingsRepository>,
        audit: Arc<dyn AuditSink>,
        default_promotion_threshold: u32,
    ) -> Self {
        Self {
            users,
            settings,
            audit,
            default_promotion_threshold,
        }
    }

    /// Gate a payment attempt on the user's current tier.
    ///
    /// The tier is re-read from the user store on every call. A rejected
    /// attempt is audited in the background; the audit write never changes
    /// the decision.
    pub async fn authorize_payment(
        &self,
        user_id: &str,
        attempt: PaymentAttempt,
    ) -> Result<User, TrustTierError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(TrustTierError::Unauthorized)?;

        if allowed_payment_methods(user.trust_tier).contains(&attempt.method) {
            return Ok(user);
        }

        warn!(
            user_id,
            method = %attempt.method,
            endpoint = %attempt.endpoint,
            ip = %attempt.request_info.ip_address,
            "Trust tier bypass attempt"
        );
        metrics::record_bypass_attempt();
        self.audit_bypass_attempt(&user, &attempt);

        Err(TrustTierError::RestrictedMethod {
            method: attempt.method,
        })
    }

    fn audit_bypass_attempt(&self, user: &User, attempt: &PaymentAttempt) {
        let record = AuditRecord {
            action: BYPASS_ATTEMPT_ACTION.to_string(),
            user_id: user.id.clone(),
            resource_type: "payment".to_string(),
            details: json!({
                "attemptedMethod": attempt.method,
                "endpoint": attempt.endpoint,
                "trustTier": user.trust_tier,
            }),
            ip_address: attempt.request_info.ip_address.clone(),
            user_agent: attempt.request_info.user_agent.clone(),
        };

        let audit = Arc::clone(&self.audit);
        tokio::spawn(async move {
            let user_id = record.user_id.clone();
            if let Err(e) = audit.log_audit(record).await {
                error!(user_id = %user_id, "Failed to write bypass audit record: {}", e);
            }
        });
    }

    /// Clean transactions required for tier 2, from platform settings
    pub async fn promotion_threshold(&self) -> u32 {
        match self.settings.get_setting(PROMOTION_THRESHOLD_SETTING).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Unparsable promotion threshold, using default");
                self.default_promotion_threshold
            }),
            Ok(None) => self.default_promotion_threshold,
            Err(e) => {
                warn!("Failed to read promotion threshold: {}", e);
                self.default_promotion_threshold
            }
        }
    }

    /// Current tier, progress toward promotion and allowed methods
    pub async fn status(&self, user_id: &str) -> Result<TrustTierStatus, TrustTierError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(TrustTierError::Unauthorized)?;
        let threshold = self.promotion_threshold().await;

        let transactions_until_promotion = match TrustTier::from_level(user.trust_tier) {
            TrustTier::Full => 0,
            TrustTier::Restricted => threshold.saturating_sub(user.clean_transaction_count),
        };

        Ok(TrustTierStatus {
            allowed_payment_methods: allowed_payment_methods(user.trust_tier),
            user_id: user.id,
            trust_tier: user.trust_tier,
            clean_transaction_count: user.clean_transaction_count,
            promotion_threshold: threshold,
            transactions_until_promotion,
        })
    }
}
