use crate::models::{BoundingBox, PlayerProfile};

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate length of one degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance in kilometers between two points given in degrees
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two players, `None` if either hides or lacks a location
pub fn distance_between(a: &PlayerProfile, b: &PlayerProfile) -> Option<f64> {
    let (lat1, lon1) = a.coordinates()?;
    let (lat2, lon2) = b.coordinates()?;
    Some(haversine_distance(lat1, lon1, lat2, lon2))
}

/// Box enclosing the circle of `radius_km` around a point.
///
/// Cheap rejection test ahead of the haversine check; never rejects a point
/// that is actually inside the radius. Wraps at the antimeridian and spans
/// every longitude when the circle reaches a pole.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let min_lat = lat - lat_delta;
    let max_lat = lat + lat_delta;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    // longitude degrees shrink towards the poles; take the widest edge of the box
    let widest_cos = min_lat.abs().max(max_lat.abs()).to_radians().cos();
    let lon_delta = radius_km / (KM_PER_DEGREE * widest_cos.max(1e-6));
    if lon_delta >= 180.0 {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon: wrap_longitude(lon - lon_delta),
        max_lon: wrap_longitude(lon + lon_delta),
    }
}

/// Fold a longitude into [-180, 180]
fn wrap_longitude(lon: f64) -> f64 {
    if lon < -180.0 {
        lon + 360.0
    } else if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    if lat < bbox.min_lat || lat > bbox.max_lat {
        return false;
    }
    if bbox.crosses_antimeridian() {
        lon >= bbox.min_lon || lon <= bbox.max_lon
    } else {
        lon >= bbox.min_lon && lon <= bbox.max_lon
    }
}
