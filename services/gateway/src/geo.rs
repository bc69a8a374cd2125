//! Great-circle distance and drive-time estimates

use roadside_common::{
    ASSUMED_SPEED_MPH, EARTH_RADIUS_MILES, METERS_PER_MILE, MIN_ETA_MINUTES, MINS_PER_HOUR,
};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Haversine distance in miles
#[must_use]
pub fn distance_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // clamp guards asin against h drifting past 1.0 for antipodal points
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// Miles to whole meters, rounded half away from zero
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn miles_to_meters(miles: f64) -> i64 {
    (miles * METERS_PER_MILE).round() as i64
}

/// Drive time in whole minutes at the assumed average speed, never below one minute
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn eta_minutes(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> u32 {
    let miles = distance_miles(GeoPoint::new(lat1, lng1), GeoPoint::new(lat2, lng2));
    let minutes = (miles / ASSUMED_SPEED_MPH * MINS_PER_HOUR as f64).round();
    (minutes as u32).max(MIN_ETA_MINUTES)
}
