//! Geodesy helpers: WGS-84 ellipsoid, unit-sphere placement and great-circle distance.
//!
//! Two coordinate frames live side by side:
//! - ECEF meters (Z through the north pole), used for curvature correction.
//! - The renderer's globe frame: Y-up, the prime meridian on +Z, east on +X.

use glam::DVec3;

pub mod wgs84 {
    /// Semi-major axis (equatorial radius) in meters.
    pub const A: f64 = 6_378_137.0;

    /// Flattening factor (1 / 298.257223563).
    pub const F: f64 = 1.0 / 298.257_223_563;

    /// First eccentricity squared.
    pub const E2: f64 = F * (2.0 - F);

    /// Semi-minor axis (polar radius) in meters.
    pub const B: f64 = A * (1.0 - F);

    /// Second eccentricity squared.
    pub const E2P: f64 = (A * A - B * B) / (B * B);
}

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geodetic (degrees, meters above the ellipsoid) to ECEF meters.
#[inline]
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, h_m: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();

    // Radius of curvature in the prime vertical.
    let n = wgs84::A / (1.0 - wgs84::E2 * sin_lat * sin_lat).sqrt();

    [
        (n + h_m) * cos_lat * cos_lon,
        (n + h_m) * cos_lat * sin_lon,
        (n * (1.0 - wgs84::E2) + h_m) * sin_lat,
    ]
}

/// ECEF meters back to geodetic `(lat_deg, lon_deg, h_m)` using Bowring's closed form.
#[inline]
pub fn ecef_to_geodetic(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let p = (x * x + y * y).sqrt();
    let lon = y.atan2(x);

    let theta = (z * wgs84::A).atan2(p * wgs84::B);
    let (sin_t, cos_t) = theta.sin_cos();

    let lat = (z + wgs84::E2P * wgs84::B * sin_t * sin_t * sin_t)
        .atan2(p - wgs84::E2 * wgs84::A * cos_t * cos_t * cos_t);

    let sin_lat = lat.sin();
    let n = wgs84::A / (1.0 - wgs84::E2 * sin_lat * sin_lat).sqrt();
    let h = p / lat.cos() - n;

    (lat.to_degrees(), lon.to_degrees(), h)
}

/// Distance from the Earth's centre to a geodetic position, in meters.
pub fn ellipsoidal_radius(lat_deg: f64, lon_deg: f64, h_m: f64) -> f64 {
    DVec3::from(geodetic_to_ecef(lat_deg, lon_deg, h_m)).length()
}

/// Places a geographic coordinate on a sphere of `radius` (plus `altitude`) in the globe frame.
#[inline]
pub fn geo_to_cartesian(lat_deg: f64, lon_deg: f64, altitude: f64, radius: f64) -> DVec3 {
    let r = radius + altitude;
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();

    DVec3::new(r * cos_lat * sin_lon, r * sin_lat, r * cos_lat * cos_lon)
}

/// Inverse of [`geo_to_cartesian`]: returns `(lat_deg, lon_deg, altitude)`.
///
/// The poles are singular for longitude; the origin maps to `(0, 0, -radius)`.
pub fn cartesian_to_geo(p: DVec3, radius: f64) -> (f64, f64, f64) {
    let r = p.length();
    if r == 0.0 {
        return (0.0, 0.0, -radius);
    }

    let lat = (p.y / r).clamp(-1.0, 1.0).asin();
    let lon = p.x.atan2(p.z);

    (lat.to_degrees(), lon.to_degrees(), r - radius)
}

/// Great-circle central angle between two positions, in degrees.
pub fn haversine_central_angle_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` marginally past 1 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().atan2((1.0 - a).max(0.0).sqrt());
    c.to_degrees()
}

/// Great-circle distance in kilometres on the mean-radius sphere.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_central_angle_deg(lat1, lon1, lat2, lon2).to_radians() * EARTH_RADIUS_KM
}

/// Maps an equirectangular texture coordinate to `(lat_deg, lon_deg)`.
#[inline]
pub fn uv_to_geo(u: f64, v: f64) -> (f64, f64) {
    ((0.5 - v) * 180.0, (u - 0.5) * 360.0)
}

/// Maps `(lat_deg, lon_deg)` to an equirectangular texture coordinate.
#[inline]
pub fn geo_to_uv(lat_deg: f64, lon_deg: f64) -> (f64, f64) {
    (lon_deg / 360.0 + 0.5, 0.5 - lat_deg / 180.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equator_prime_meridian_is_on_plus_z() {
        let p = geo_to_cartesian(0.0, 0.0, 0.0, 1.0);
        assert!((p - DVec3::Z).length() < 1e-12);

        let east = geo_to_cartesian(0.0, 90.0, 0.0, 1.0);
        assert!((east - DVec3::X).length() < 1e-12);

        let north = geo_to_cartesian(90.0, 0.0, 0.0, 1.0);
        assert!((north - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn ecef_round_trip() {
        let [x, y, z] = geodetic_to_ecef(52.52, 13.40, 120.0);
        let (lat, lon, h) = ecef_to_geodetic(x, y, z);
        assert!((lat - 52.52).abs() < 1e-9);
        assert!((lon - 13.40).abs() < 1e-9);
        assert!((h - 120.0).abs() < 1e-4);
    }

    #[test]
    fn ellipsoid_radius_spans_axes() {
        assert!((ellipsoidal_radius(0.0, 0.0, 0.0) - wgs84::A).abs() < 1e-6);
        assert!((ellipsoidal_radius(90.0, 0.0, 0.0) - wgs84::B).abs() < 1e-6);
    }

    #[test]
    fn haversine_known_distances() {
        assert_eq!(haversine_central_angle_deg(10.0, 20.0, 10.0, 20.0), 0.0);
        assert!((haversine_central_angle_deg(0.0, 0.0, 0.0, 90.0) - 90.0).abs() < 1e-9);
        assert!((haversine_central_angle_deg(0.0, 0.0, 0.0, 180.0) - 180.0).abs() < 1e-9);

        // New York to London is about 5570 km.
        let d = haversine_km(40.7128, -74.0060, 51.5074, -0.1278);
        assert!((d - 5570.0).abs() < 20.0, "got {d}");
    }

    #[test]
    fn uv_geo_inverse() {
        let (lat, lon) = uv_to_geo(0.75, 0.25);
        assert_eq!((lat, lon), (45.0, 90.0));
        let (u, v) = geo_to_uv(lat, lon);
        assert!((u - 0.75).abs() < 1e-12 && (v - 0.25).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn sphere_round_trip(
            lat in -89.0f64..89.0,
            lon in -179.9f64..179.9,
            alt in 0.0f64..0.5,
        ) {
            let p = geo_to_cartesian(lat, lon, alt, 1.0);
            let (lat2, lon2, alt2) = cartesian_to_geo(p, 1.0);
            prop_assert!((lat - lat2).abs() < 1e-9);
            prop_assert!((lon - lon2).abs() < 1e-9);
            prop_assert!((alt - alt2).abs() < 1e-9);
        }

        #[test]
        fn haversine_is_symmetric(
            a in -80.0f64..80.0, b in -180.0f64..180.0,
            c in -80.0f64..80.0, d in -180.0f64..180.0,
        ) {
            let ab = haversine_central_angle_deg(a, b, c, d);
            let ba = haversine_central_angle_deg(c, d, a, b);
            prop_assert!((ab - ba).abs() < 1e-9);
            prop_assert!((0.0..=180.0 + 1e-9).contains(&ab));
        }
    }
}
