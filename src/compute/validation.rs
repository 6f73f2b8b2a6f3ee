//! Boundary validation for coordinates, distances and time windows.
//!
//! Everything here runs before a request reaches the index.

use crate::error::{MeetspotError, Result};
use crate::types::GeoPoint;

/// Minutes in a day; start times live in `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: i64 = 1440;

/// Validates a point has finite latitude in [-90, 90] and longitude in [-180, 180].
///
/// # Examples
///
/// ```
/// use meetspot::GeoPoint;
/// use meetspot::compute::validation::validate_point;
///
/// assert!(validate_point(&GeoPoint::new(51.05, -114.05)).is_ok());
/// assert!(validate_point(&GeoPoint::new(95.0, -114.05)).is_err());
/// assert!(validate_point(&GeoPoint::new(51.05, 200.0)).is_err());
/// ```
pub fn validate_point(point: &GeoPoint) -> Result<()> {
    let (lat, lon) = (point.latitude, point.longitude);

    if !lat.is_finite() {
        return Err(MeetspotError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            lat
        )));
    }

    if !lon.is_finite() {
        return Err(MeetspotError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            lon
        )));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Err(MeetspotError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }

    if !(-180.0..=180.0).contains(&lon) {
        return Err(MeetspotError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lon
        )));
    }

    Ok(())
}

/// Validates a search radius: finite and non-negative.
pub fn validate_distance(distance_meters: f64) -> Result<()> {
    if !distance_meters.is_finite() || distance_meters < 0.0 {
        return Err(MeetspotError::InvalidInput(format!(
            "Distance must be a finite, non-negative number of meters, got: {}",
            distance_meters
        )));
    }
    Ok(())
}

/// Validates a half-open `[start, end)` window. `start == end` is an empty
/// window and is allowed; `start > end` is malformed.
pub fn validate_window(start: i64, end: i64) -> Result<()> {
    if start > end {
        return Err(MeetspotError::InvalidInput(format!(
            "Time window start ({}) must not exceed end ({})",
            start, end
        )));
    }
    Ok(())
}

/// Validates a minute-of-day start time in `[0, 1439]`.
pub fn validate_start_time(minutes: i64) -> Result<()> {
    if !(0..MINUTES_PER_DAY).contains(&minutes) {
        return Err(MeetspotError::InvalidInput(format!(
            "Start time out of range [0, {}]: {}",
            MINUTES_PER_DAY - 1,
            minutes
        )));
    }
    Ok(())
}

/// Validates a weekday in `[0, 6]`.
pub fn validate_weekday(weekday: i64) -> Result<()> {
    if !(0..=6).contains(&weekday) {
        return Err(MeetspotError::InvalidInput(format!(
            "Weekday out of range [0, 6]: {}",
            weekday
        )));
    }
    Ok(())
}
