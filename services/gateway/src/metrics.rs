//! Metrics for the dispatch gateway
//!
//! Recorded through the `metrics` facade when the `monitoring` feature is on;
//! every recorder is a no-op otherwise. Exporting is left to whichever
//! recorder the embedding process installs.

#[cfg(feature = "monitoring")]
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions once at startup
pub fn register_metrics() {
    #[cfg(feature = "monitoring")]
    {
        describe_gauge!(
            "roadside_gateway_websocket_connections_active",
            "Number of registered realtime connections"
        );
        describe_counter!(
            "roadside_gateway_events_dispatched_total",
            "Domain events dispatched, by kind"
        );
        describe_counter!(
            "roadside_gateway_event_deliveries_total",
            "Sockets reached by dispatched events"
        );
        describe_counter!(
            "roadside_gateway_rate_limit_exceeded_total",
            "Requests rejected by the rate limiter"
        );
        describe_counter!(
            "roadside_gateway_trust_tier_bypass_attempts_total",
            "Card payment attempts by restricted-tier users"
        );
        describe_counter!(
            "roadside_gateway_websocket_frames_dropped_total",
            "Frames dropped because a socket's outbound queue was full"
        );
        describe_counter!(
            "roadside_gateway_websocket_auth_timeouts_total",
            "Sockets closed for never authenticating"
        );
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn set_ws_connections(count: usize) {
    #[cfg(feature = "monitoring")]
    gauge!("roadside_gateway_websocket_connections_active").set(count as f64);
    #[cfg(not(feature = "monitoring"))]
    let _ = count;
}

pub fn record_event_dispatched(kind: &'static str, reached: usize) {
    #[cfg(feature = "monitoring")]
    {
        counter!("roadside_gateway_events_dispatched_total", "kind" => kind).increment(1);
        counter!("roadside_gateway_event_deliveries_total", "kind" => kind)
            .increment(reached as u64);
    }
    #[cfg(not(feature = "monitoring"))]
    let _ = (kind, reached);
}

pub fn record_rate_limited() {
    #[cfg(feature = "monitoring")]
    counter!("roadside_gateway_rate_limit_exceeded_total").increment(1);
}

pub fn record_bypass_attempt() {
    #[cfg(feature = "monitoring")]
    counter!("roadside_gateway_trust_tier_bypass_attempts_total").increment(1);
}

pub fn record_auth_timeout() {
    #[cfg(feature = "monitoring")]
    counter!("roadside_gateway_websocket_auth_timeouts_total").increment(1);
}

pub fn record_frame_dropped() {
    #[cfg(feature = "monitoring")]
    counter!("roadside_gateway_websocket_frames_dropped_total").increment(1);
}
