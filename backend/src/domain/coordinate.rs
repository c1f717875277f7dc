//! Validated coordinates and the operating region.

use geodesy::{GeoPoint, haversine_meters, round_to};
use serde::{Deserialize, Serialize};

/// Decimal places kept when a coordinate becomes part of a cache or storage
/// key. Four places is roughly eleven metres at the equator.
pub const KEY_PRECISION_DECIMALS: u8 = 4;

/// A WGS84 coordinate with finite, in-range components.
///
/// # Examples
/// ```
/// use geo_analysis::domain::Coordinate;
///
/// let colombo = Coordinate::new(6.927_149, 79.861_243).expect("valid");
/// assert_eq!(colombo.key(), "6.9271,79.8612");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

/// Reasons a latitude/longitude pair is rejected.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateValidationError {
    /// One of the components is NaN or infinite.
    #[error("coordinates must be finite numbers")]
    NonFinite,
    /// Latitude lies outside `[-90, 90]`.
    #[error("latitude {0} must be between -90 and 90")]
    LatitudeOutOfRange(f64),
    /// Longitude lies outside `[-180, 180]`.
    #[error("longitude {0} must be between -180 and 180")]
    LongitudeOutOfRange(f64),
}

impl Coordinate {
    /// Validate and build a coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateValidationError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateValidationError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateValidationError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateValidationError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build a coordinate from compile-time constants known to be in range.
    pub(crate) const fn from_static(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in decimal degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The same position rounded to [`KEY_PRECISION_DECIMALS`].
    pub fn rounded(&self) -> Self {
        Self {
            latitude: round_to(self.latitude, KEY_PRECISION_DECIMALS),
            longitude: round_to(self.longitude, KEY_PRECISION_DECIMALS),
        }
    }

    /// Canonical `"lat,lon"` text at key precision.
    ///
    /// Two coordinates that round to the same value always share a key.
    pub fn key(&self) -> String {
        let rounded = self.rounded();
        // Normalise negative zero so "-0.0000" never appears in keys.
        let latitude = rounded.latitude + 0.0;
        let longitude = rounded.longitude + 0.0;
        format!("{latitude:.4},{longitude:.4}")
    }

    /// Great-circle distance to `other` in metres.
    pub fn distance_meters(&self, other: &Self) -> f64 {
        haversine_meters(self.to_point(), other.to_point())
    }

    /// Convert to the geometry crate's point type.
    pub fn to_point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl From<Coordinate> for RawCoordinate {
    fn from(value: Coordinate) -> Self {
        Self {
            latitude: value.latitude,
            longitude: value.longitude,
        }
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateValidationError;

    fn try_from(value: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(value.latitude, value.longitude)
    }
}

/// Rectangular region inside which analysis requests are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingBounds {
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
}

/// Reasons a bounding box is rejected.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum BoundsValidationError {
    /// A corner is not a valid coordinate.
    #[error("invalid bounds corner: {0}")]
    InvalidCorner(#[from] CoordinateValidationError),
    /// Minimum exceeds maximum on at least one axis.
    #[error("bounds minimum must not exceed maximum")]
    Inverted,
}

impl OperatingBounds {
    /// Build bounds from inclusive minimum and maximum components.
    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Result<Self, BoundsValidationError> {
        Coordinate::new(min_latitude, min_longitude)?;
        Coordinate::new(max_latitude, max_longitude)?;
        if min_latitude > max_latitude || min_longitude > max_longitude {
            return Err(BoundsValidationError::Inverted);
        }
        Ok(Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        })
    }

    /// Sri Lanka's land area with a small coastal margin.
    pub const fn sri_lanka() -> Self {
        Self {
            min_latitude: 5.5,
            max_latitude: 10.0,
            min_longitude: 79.0,
            max_longitude: 82.0,
        }
    }

    pub const fn min_latitude(&self) -> f64 {
        self.min_latitude
    }

    pub const fn max_latitude(&self) -> f64 {
        self.max_latitude
    }

    pub const fn min_longitude(&self) -> f64 {
        self.min_longitude
    }

    pub const fn max_longitude(&self) -> f64 {
        self.max_longitude
    }

    /// Whether `coordinate` lies inside the bounds (edges inclusive).
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude())
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude())
    }
}

impl Default for OperatingBounds {
    fn default() -> Self {
        Self::sri_lanka()
    }
}

impl std::fmt::Display for OperatingBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat {}..{}, lon {}..{}",
            self.min_latitude, self.max_latitude, self.min_longitude, self.max_longitude
        )
    }
}
