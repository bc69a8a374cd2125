//! Fixed-window rate limiting keyed by opaque strings (usually `client:endpoint`)

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RateLimitConfig;

/// A request budget per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    #[must_use]
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Named policies for the common endpoint classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPreset {
    /// 100 per minute
    Standard,
    /// 20 per minute
    Strict,
    /// 10 per five minutes
    Auth,
    /// 5 per minute
    Notifications,
    /// 200 per minute
    Webhooks,
}

impl RateLimitPreset {
    #[must_use]
    pub const fn policy(self) -> RateLimitPolicy {
        match self {
            Self::Standard => RateLimitPolicy::new(100, Duration::from_secs(60)),
            Self::Strict => RateLimitPolicy::new(20, Duration::from_secs(60)),
            Self::Auth => RateLimitPolicy::new(10, Duration::from_secs(300)),
            Self::Notifications => RateLimitPolicy::new(5, Duration::from_secs(60)),
            Self::Webhooks => RateLimitPolicy::new(200, Duration::from_secs(60)),
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes, in `(0, window]`
    pub reset: Duration,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl RateLimitEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window
    }
}

/// Process-local fixed-window limiter.
///
/// Created once at startup and shared behind an `Arc`; state lives until the
/// process exits. Not shared across gateway instances.
pub struct RateLimiter {
    entries: Mutex<FxHashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            config,
        }
    }

    /// Count one request against `key` under `policy`
    pub fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        self.check_at(key, policy, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading
    pub fn check_at(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateLimitDecision {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(key).filter(|entry| !entry.is_expired(now)) {
            entry.count = entry.count.saturating_add(1);
            let elapsed = now.saturating_duration_since(entry.window_start);
            let reset = entry
                .window
                .saturating_sub(elapsed)
                .max(Duration::from_millis(1))
                .min(entry.window);

            return RateLimitDecision {
                allowed: entry.count <= policy.max_requests,
                limit: policy.max_requests,
                remaining: policy.max_requests.saturating_sub(entry.count),
                reset,
            };
        }

        entries.insert(
            key.to_string(),
            RateLimitEntry {
                count: 1,
                window_start: now,
                window: policy.window,
            },
        );
        RateLimitDecision {
            allowed: true,
            limit: policy.max_requests,
            remaining: policy.max_requests.saturating_sub(1),
            reset: policy.window,
        }
    }

    /// Check an HTTP request, choosing the policy from the configured endpoint map
    pub fn check_request(&self, client_ip: &str, path: &str) -> RateLimitDecision {
        let policy = self.policy_for(path);
        if !self.config.enabled {
            return RateLimitDecision {
                allowed: true,
                limit: policy.max_requests,
                remaining: policy.max_requests,
                reset: policy.window,
            };
        }

        let decision = self.check(&format!("{client_ip}:{path}"), policy);
        debug!(
            client_ip,
            path,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit check"
        );
        decision
    }

    /// Policy for a request path: exact match, then longest matching prefix, then default
    #[must_use]
    pub fn policy_for(&self, path: &str) -> RateLimitPolicy {
        if let Some(preset) = self.config.endpoint_limits.get(path) {
            return preset.policy();
        }

        self.config
            .endpoint_limits
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or_else(
                || self.config.default_preset.policy(),
                |(_, preset)| preset.policy(),
            )
    }

    /// Drop expired windows, then trim to the configured key cap
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));

        let max = self.config.max_tracked_keys;
        if entries.len() > max {
            let overflow: Vec<_> = entries.keys().take(entries.len() - max).cloned().collect();
            for key in overflow {
                entries.remove(&key);
            }
        }

        before - entries.len()
    }

    /// Periodically sweep until the returned handle is aborted
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = self.sweep(Instant::now());
                if removed > 0 {
                    info!(removed, "Swept rate limit windows");
                }
            }
        })
    }

    /// Get current rate limiting statistics
    pub fn get_stats(&self) -> RateLimitStats {
        RateLimitStats {
            enabled: self.config.enabled,
            tracked_keys: self.entries.lock().len(),
            default_limit: self.config.default_preset.policy().max_requests,
        }
    }
}

/// Rate limiting statistics
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub enabled: bool,
    pub tracked_keys: usize,
    pub default_limit: u32,
}
