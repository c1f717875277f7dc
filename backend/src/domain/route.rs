//! Direction results and travel modes.

use std::str::FromStr;

use geodesy::CardinalDirection;
use serde::{Deserialize, Serialize};

use super::Coordinate;

/// How the traveller moves between two points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Drive,
    Walk,
    Transit,
    Bicycle,
}

impl TravelMode {
    /// Snake-case identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Walk => "walk",
            Self::Transit => "transit",
            Self::Bicycle => "bicycle",
        }
    }

    /// Assumed average speed used by the estimated tier.
    pub const fn average_speed_kmh(self) -> f64 {
        match self {
            Self::Drive => 50.0,
            Self::Walk => 5.0,
            Self::Transit | Self::Bicycle => 15.0,
        }
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for unrecognised travel mode names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown travel mode `{0}`; expected drive, walk, transit or bicycle")]
pub struct UnknownTravelMode(pub String);

impl FromStr for TravelMode {
    type Err = UnknownTravelMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drive" | "driving" => Ok(Self::Drive),
            "walk" | "walking" => Ok(Self::Walk),
            "transit" => Ok(Self::Transit),
            "bicycle" | "bicycling" => Ok(Self::Bicycle),
            _ => Err(UnknownTravelMode(value.to_owned())),
        }
    }
}

/// Which rung of the fallback ladder produced a direction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTier {
    /// Traffic-aware routing.
    Primary,
    /// Older directions endpoint.
    Legacy,
    /// Local great-circle estimate. Never fails.
    Estimated,
}

impl RouteTier {
    /// Snake-case identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Legacy => "legacy",
            Self::Estimated => "estimated",
        }
    }
}

impl std::fmt::Display for RouteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instruction along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Directions between two coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionResult {
    /// Label of the origin, e.g. a reference town.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_name: Option<String>,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub travel_mode: TravelMode,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Dominant heading from origin to destination.
    pub heading: CardinalDirection,
    pub steps: Vec<RouteStep>,
    pub source_tier: RouteTier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("drive", TravelMode::Drive)]
    #[case("WALKING", TravelMode::Walk)]
    #[case(" transit ", TravelMode::Transit)]
    #[case("bicycling", TravelMode::Bicycle)]
    fn parses_travel_modes(#[case] raw: &str, #[case] expected: TravelMode) {
        assert_eq!(raw.parse::<TravelMode>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("hovercraft".parse::<TravelMode>().is_err());
    }
}
