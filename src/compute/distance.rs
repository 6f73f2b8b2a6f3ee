//! Great-circle distances and the lower bounds the query planner prunes with.

use crate::types::GeoPoint;
use geo::{Distance, Haversine, Rect};

/// Mean earth radius used by `geo::Haversine`, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Lower bounds are shaved by this much so float noise never prunes a
/// candidate sitting exactly on the search radius.
const BOUND_SLACK_METERS: f64 = 1e-3;

/// Haversine distance between two points, in meters.
///
/// ```
/// use meetspot::GeoPoint;
/// use meetspot::compute::distance::haversine_meters;
///
/// let a = GeoPoint::new(51.05, -114.05);
/// let b = GeoPoint::new(51.0117555, -114.0837796);
/// let d = haversine_meters(&a, &b);
/// assert!(d > 4_000.0 && d < 6_000.0);
/// ```
pub fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(a.to_geo(), b.to_geo())
}

/// Shortest angular separation of two longitudes, in degrees `[0, 180]`.
fn longitude_separation(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Lower bound on the distance from a point at `latitude` to any point
/// whose longitude differs by at least `separation` degrees. This is the
/// distance to the nearest boundary meridian; past 90 degrees the nearest
/// point of that meridian is the pole.
fn meridian_gap_meters(latitude: f64, separation: f64) -> f64 {
    let s = separation.clamp(0.0, 90.0).to_radians().sin();
    let c = latitude.to_radians().cos().max(0.0);
    EARTH_RADIUS_METERS * (c * s).clamp(0.0, 1.0).asin()
}

fn latitude_gap_meters(degrees: f64) -> f64 {
    EARTH_RADIUS_METERS * degrees.max(0.0).to_radians()
}

fn shave(bound: f64) -> f64 {
    (bound - BOUND_SLACK_METERS).max(0.0)
}

/// Half-extents, in degrees, of the bounding box of every point within
/// `radius_meters` of `point`: `(latitude half-height, longitude half-width)`.
/// The width is `None` when the circle reaches a pole, where every longitude
/// is in range.
pub fn cap_extent_degrees(point: &GeoPoint, radius_meters: f64) -> (f64, Option<f64>) {
    let delta = (radius_meters + BOUND_SLACK_METERS) / EARTH_RADIUS_METERS;
    let lat_half = delta.to_degrees();
    if delta >= std::f64::consts::FRAC_PI_2 || point.latitude.abs() + lat_half >= 90.0 {
        return (lat_half, None);
    }

    let ratio = delta.sin() / point.latitude.to_radians().cos();
    if ratio < 1.0 {
        (lat_half, Some(ratio.asin().to_degrees()))
    } else {
        (lat_half, None)
    }
}

/// Lower bound on the distance from `point` to anything inside `rect`
/// (x = longitude, y = latitude, degrees).
pub fn min_distance_to_rect(point: &GeoPoint, rect: &Rect<f64>) -> f64 {
    let (lat, lon) = (point.latitude, point.longitude);

    let lat_gap = if lat < rect.min().y {
        latitude_gap_meters(rect.min().y - lat)
    } else if lat > rect.max().y {
        latitude_gap_meters(lat - rect.max().y)
    } else {
        0.0
    };

    let lon_gap = if (rect.min().x..=rect.max().x).contains(&lon) {
        0.0
    } else {
        let separation = longitude_separation(lon, rect.min().x)
            .min(longitude_separation(lon, rect.max().x));
        meridian_gap_meters(lat, separation)
    };

    shave(lat_gap.max(lon_gap))
}

/// Lower bound on the distance from `point` to anything *outside* `covered`.
///
/// `covers_all_longitudes`, `covers_north` and `covers_south` tell whether the
/// rectangle already reaches all the way around the globe or to a pole, in
/// which case there is nothing left in that direction.
pub fn min_distance_outside(
    point: &GeoPoint,
    covered: &Rect<f64>,
    covers_all_longitudes: bool,
    covers_north: bool,
    covers_south: bool,
) -> f64 {
    let (lat, lon) = (point.latitude, point.longitude);

    let north = if covers_north {
        f64::INFINITY
    } else {
        latitude_gap_meters(covered.max().y - lat)
    };
    let south = if covers_south {
        f64::INFINITY
    } else {
        latitude_gap_meters(lat - covered.min().y)
    };
    let sideways = if covers_all_longitudes {
        f64::INFINITY
    } else {
        let separation = longitude_separation(lon, covered.min().x)
            .min(longitude_separation(lon, covered.max().x));
        meridian_gap_meters(lat, separation)
    };

    let bound = north.min(south).min(sideways);
    if bound.is_infinite() { bound } else { shave(bound) }
}
