//! Time-of-day pricing with a storm-mode surge override
//!
//! A quote is `round(base_price * multiplier / 10000)` where the multiplier
//! comes from the highest-priority active time block covering the local hour
//! of the booking. Storm mode, while active, outranks every block.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use parking_lot::RwLock;
use roadside_common::{BASIS_POINTS_SCALE, NEUTRAL_MULTIPLIER_BP, STANDARD_BLOCK_NAME, ServiceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{ServiceRepository, StoreError, TimeBlockConfig, TimeBlockRepository};

#[derive(Debug, Error)]
pub enum PricingError {
    /// Callers must only quote services that exist
    #[error("service {0} does not exist")]
    ServiceNotFound(String),
    #[error("storm multiplier must be positive, got {0}")]
    InvalidMultiplier(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PricingError> for ServiceError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::ServiceNotFound(_) => Self::PreconditionFailed(err.to_string()),
            PricingError::InvalidMultiplier(_) => Self::InvalidRequest(err.to_string()),
            PricingError::Store(store) => store.into(),
        }
    }
}

/// Computed price for a service at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub base_price: i64,
    /// Basis points
    pub multiplier: i64,
    pub block_name: String,
    pub final_price: i64,
}

/// An active storm-mode surge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StormMode {
    pub template_name: String,
    /// Basis points
    pub multiplier: i64,
    pub activated_by: String,
    pub activated_at: DateTime<Utc>,
}

/// Whether `block` covers `hour`, wrapping past midnight when `start_hour > end_hour`
#[must_use]
pub const fn block_matches(block: &TimeBlockConfig, hour: u32) -> bool {
    if block.start_hour <= block.end_hour {
        hour >= block.start_hour && hour < block.end_hour
    } else {
        hour >= block.start_hour || hour < block.end_hour
    }
}

/// Highest-priority active block covering `hour`. Equal priorities resolve to
/// the earliest block in `blocks`.
#[must_use]
pub fn select_block(blocks: &[TimeBlockConfig], hour: u32) -> Option<&TimeBlockConfig> {
    blocks
        .iter()
        .filter(|block| block.is_active && block_matches(block, hour))
        .fold(None, |best: Option<&TimeBlockConfig>, block| match best {
            Some(current) if current.priority >= block.priority => Some(current),
            _ => Some(block),
        })
}

/// `round(base * multiplier_bp / 10000)`, halves rounding up
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn apply_multiplier(base_price: i64, multiplier_bp: i64) -> i64 {
    let scale = i128::from(BASIS_POINTS_SCALE);
    let scaled = i128::from(base_price) * i128::from(multiplier_bp);
    let rounded = (scaled * 2 + scale).div_euclid(scale * 2);
    rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Resolves effective prices from the service catalog and time-block config
pub struct PricingEngine {
    services: Arc<dyn ServiceRepository>,
    time_blocks: Arc<dyn TimeBlockRepository>,
    local_offset: FixedOffset,
    storm: RwLock<Option<StormMode>>,
}

impl PricingEngine {
    #[must_use]
    pub fn new(
        services: Arc<dyn ServiceRepository>,
        time_blocks: Arc<dyn TimeBlockRepository>,
        local_offset: FixedOffset,
    ) -> Self {
        Self {
            services,
            time_blocks,
            local_offset,
            storm: RwLock::new(None),
        }
    }

    /// Quote `service_id` at `scheduled_at`, or now when absent.
    ///
    /// An unknown service is a [`PricingError::ServiceNotFound`], which
    /// surfaces as a server fault rather than a validation error.
    pub async fn quote_price(
        &self,
        service_id: &str,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<PriceQuote, PricingError> {
        let at = scheduled_at.unwrap_or_else(Utc::now);
        let hour = at.with_timezone(&self.local_offset).hour();

        let (service, blocks) = tokio::try_join!(
            self.services.find_service(service_id),
            self.time_blocks.list_time_blocks(),
        )?;
        let service =
            service.ok_or_else(|| PricingError::ServiceNotFound(service_id.to_string()))?;

        let (multiplier, block_name) = if let Some(storm) = self.storm_mode() {
            (storm.multiplier, storm.template_name)
        } else if let Some(block) = select_block(&blocks, hour) {
            (block.multiplier, block.name.clone())
        } else {
            (NEUTRAL_MULTIPLIER_BP, STANDARD_BLOCK_NAME.to_string())
        };

        let quote = PriceQuote {
            base_price: service.base_price,
            multiplier,
            block_name,
            final_price: apply_multiplier(service.base_price, multiplier),
        };
        debug!(service_id, hour, block = %quote.block_name, final_price = quote.final_price, "Quoted price");
        Ok(quote)
    }

    /// Currently active storm mode, if any
    #[must_use]
    pub fn storm_mode(&self) -> Option<StormMode> {
        self.storm.read().clone()
    }

    /// Turn storm mode on, replacing any active surge
    pub fn activate_storm_mode(
        &self,
        template_name: impl Into<String>,
        multiplier: i64,
        activated_by: impl Into<String>,
    ) -> Result<StormMode, PricingError> {
        if multiplier <= 0 {
            return Err(PricingError::InvalidMultiplier(multiplier));
        }

        let storm = StormMode {
            template_name: template_name.into(),
            multiplier,
            activated_by: activated_by.into(),
            activated_at: Utc::now(),
        };
        info!(
            template = %storm.template_name,
            multiplier,
            activated_by = %storm.activated_by,
            "Storm mode activated"
        );
        *self.storm.write() = Some(storm.clone());
        Ok(storm)
    }

    /// Turn storm mode off. Returns the surge that was active.
    pub fn deactivate_storm_mode(&self, deactivated_by: &str) -> Option<StormMode> {
        let previous = self.storm.write().take();
        if previous.is_some() {
            info!(deactivated_by, "Storm mode deactivated");
        }
        previous
    }
}
