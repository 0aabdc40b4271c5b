// src/geo.rs
//! Great-circle distance on a spherical Earth

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_to(&self, other: &LatLng) -> f64 {
        distance_meters(*self, *other)
    }
}

/// Haversine distance between two points, in meters
pub fn distance_meters(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = LatLng::new(42.438878, -71.119277);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            (LatLng::new(0.0, 0.0), LatLng::new(10.0, 10.0)),
            (LatLng::new(51.5007, -0.1246), LatLng::new(40.6892, -74.0445)),
            (LatLng::new(-33.8568, 151.2153), LatLng::new(35.6586, 139.7454)),
            (LatLng::new(89.9, 179.9), LatLng::new(-89.9, -179.9)),
        ];

        for (a, b) in pairs {
            assert_eq!(distance_meters(a, b), distance_meters(b, a));
        }
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // pi * R / 180
        let d = distance_meters(LatLng::new(0.0, 0.0), LatLng::new(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_known_city_pair() {
        // Big Ben to the Statue of Liberty, ~5575 km on the mean sphere
        let d = LatLng::new(51.5007, -0.1246).distance_to(&LatLng::new(40.6892, -74.0445));
        assert!((d / 1000.0 - 5574.8).abs() < 1.0, "got {} km", d / 1000.0);
    }

    #[test]
    fn test_antipodal_points() {
        let d = distance_meters(LatLng::new(0.0, 0.0), LatLng::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1e-6);
    }
}
