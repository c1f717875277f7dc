//! Spherical-earth primitives used across the geo-analysis backend.
//!
//! Everything here is pure and allocation free: great-circle distance via the
//! Haversine formula, a coarse cardinal heading between two points, and the
//! rounding helper used when coordinates become cache or storage keys.
//!
//! ```
//! use geodesy::{GeoPoint, haversine_meters};
//!
//! let colombo = GeoPoint::new(6.9271, 79.8612);
//! let kandy = GeoPoint::new(7.2906, 80.6337);
//! let metres = haversine_meters(colombo, kandy);
//! assert!((94_000.0..96_000.0).contains(&metres));
//! ```
#![expect(
    clippy::float_arithmetic,
    reason = "great-circle maths is inherently floating point"
)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres used by [`haversine_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees (WGS84).
///
/// No range validation happens here; callers that accept untrusted input
/// validate before constructing points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in metres.
///
/// `a = sin²(Δφ/2) + cos φ1 · cos φ2 · sin²(Δλ/2)`, `c = 2·atan2(√a, √(1−a))`,
/// `d = R·c`.
#[must_use]
pub fn haversine_meters(from: GeoPoint, to: GeoPoint) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_phi = (to.latitude - from.latitude).to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let half_phi = (delta_phi / 2.0).sin();
    let half_lambda = (delta_lambda / 2.0).sin();
    let raw = half_phi.mul_add(half_phi, phi1.cos() * phi2.cos() * half_lambda * half_lambda);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = raw.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Great-circle distance between two points in kilometres.
#[must_use]
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    haversine_meters(from, to) / 1_000.0
}

/// Round `value` to `decimals` decimal places.
#[must_use]
pub fn round_to(value: f64, decimals: u8) -> f64 {
    let factor = 10_f64.powi(i32::from(decimals));
    (value * factor).round() / factor
}

/// One of the four principal compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalDirection {
    /// Increasing latitude.
    North,
    /// Decreasing latitude.
    South,
    /// Increasing longitude.
    East,
    /// Decreasing longitude.
    West,
}

impl CardinalDirection {
    /// Choose the dominant heading from `from` towards `to`.
    ///
    /// Compares the absolute latitude and longitude deltas; ties resolve to
    /// the north/south axis. Identical points resolve to [`Self::North`].
    #[must_use]
    pub fn between(from: GeoPoint, to: GeoPoint) -> Self {
        let delta_lat = to.latitude - from.latitude;
        let delta_lon = to.longitude - from.longitude;
        if delta_lat.abs() >= delta_lon.abs() {
            if delta_lat < 0.0 { Self::South } else { Self::North }
        } else if delta_lon < 0.0 {
            Self::West
        } else {
            Self::East
        }
    }

    /// Lower-case English name, e.g. `"north"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl fmt::Display for CardinalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    //! Distance, heading, and rounding behaviour.

    use super::*;
    use rstest::rstest;

    const EPSILON_M: f64 = 1e-6;

    #[rstest]
    #[case(GeoPoint::new(6.9271, 79.8612), GeoPoint::new(7.2906, 80.6337))]
    #[case(GeoPoint::new(6.0535, 80.2210), GeoPoint::new(9.6615, 80.0255))]
    #[case(GeoPoint::new(-33.8688, 151.2093), GeoPoint::new(51.5074, -0.1278))]
    fn distance_is_symmetric(#[case] a: GeoPoint, #[case] b: GeoPoint) {
        let forward = haversine_meters(a, b);
        let backward = haversine_meters(b, a);
        assert!((forward - backward).abs() < EPSILON_M);
    }

    #[rstest]
    #[case(GeoPoint::new(6.9271, 79.8612))]
    #[case(GeoPoint::new(0.0, 0.0))]
    #[case(GeoPoint::new(89.9, -179.9))]
    fn distance_to_self_is_zero(#[case] point: GeoPoint) {
        assert!(haversine_meters(point, point).abs() < EPSILON_M);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let km = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((km - 111.19).abs() < 0.01, "got {km}");
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let metres = haversine_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!(metres.is_finite());
        assert!((metres - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[rstest]
    #[case(GeoPoint::new(7.0, 80.0), CardinalDirection::North)]
    #[case(GeoPoint::new(5.0, 80.0), CardinalDirection::South)]
    #[case(GeoPoint::new(6.0, 81.0), CardinalDirection::East)]
    #[case(GeoPoint::new(6.0, 79.0), CardinalDirection::West)]
    #[case(GeoPoint::new(6.5, 80.5), CardinalDirection::North)]
    fn heading_follows_dominant_axis(#[case] to: GeoPoint, #[case] expected: CardinalDirection) {
        let from = GeoPoint::new(6.0, 80.0);
        assert_eq!(CardinalDirection::between(from, to), expected);
    }

    #[rstest]
    #[case(6.927_149, 4, 6.9271)]
    #[case(79.861_26, 4, 79.8613)]
    #[case(-0.000_04, 4, -0.0)]
    fn rounding_uses_requested_precision(
        #[case] value: f64,
        #[case] decimals: u8,
        #[case] expected: f64,
    ) {
        assert!((round_to(value, decimals) - expected).abs() < 1e-12);
    }
}
