//! Capped exponential backoff for reconnect scheduling

use roadside_common::{RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS};
use std::time::Duration;

/// `min(1000 * 2^retry, 30000)` milliseconds
#[must_use]
pub fn reconnect_delay(retry: u32) -> Duration {
    capped_delay(
        retry,
        Duration::from_millis(RECONNECT_BASE_DELAY_MS),
        Duration::from_millis(RECONNECT_MAX_DELAY_MS),
    )
}

/// `min(base * 2^retry, max)`, saturating instead of overflowing
#[must_use]
pub fn capped_delay(retry: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry)).min(max)
}
