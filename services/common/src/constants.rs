//! Common constants used across the dispatch services
//!
//! Single source of truth for the numbers the pricing, trust and realtime
//! layers agree on.

// Basis-point arithmetic
/// Multiplier scale: 10000 basis points = 1.0x
pub const BASIS_POINTS_SCALE: i64 = 10_000;
/// Multiplier applied when no time block matches
pub const NEUTRAL_MULTIPLIER_BP: i64 = BASIS_POINTS_SCALE;
/// Block name reported when no time block matches
pub const STANDARD_BLOCK_NAME: &str = "Standard";

// Trust tiers
pub const TRUST_TIER_FULL: i64 = 2;
/// Platform setting key holding the promotion threshold
pub const PROMOTION_THRESHOLD_SETTING: &str = "trust_tier_promotion_threshold";
pub const DEFAULT_PROMOTION_THRESHOLD: u32 = 5;
/// Audit action recorded when a restricted user reaches a card endpoint
pub const BYPASS_ATTEMPT_ACTION: &str = "trust_tier.bypass_attempt";

// Realtime protocol
pub const WS_PATH: &str = "/ws";
pub const AUTH_TIMEOUT_MS: u64 = 10_000;
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Close code sent when a socket never authenticates
pub const AUTH_TIMEOUT_CLOSE_CODE: u16 = 4001;
/// Frames buffered per socket before sends to it are dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

// Reconnect backoff
pub const RECONNECT_BASE_DELAY_MS: u64 = 1000;
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

// Geo
pub const EARTH_RADIUS_MILES: f64 = 3958.8;
pub const METERS_PER_MILE: f64 = 1609.344;
pub const ASSUMED_SPEED_MPH: f64 = 35.0;
pub const MIN_ETA_MINUTES: u32 = 1;
pub const MINS_PER_HOUR: u64 = 60;
