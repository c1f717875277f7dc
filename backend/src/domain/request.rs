//! Validation of incoming analysis requests.
//!
//! Everything here runs before any collaborator is touched; only
//! [`ErrorCode::InvalidInput`](super::ErrorCode::InvalidInput) escapes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::category::FacilityCategory;
use super::coordinate::{Coordinate, OperatingBounds};
use super::route::TravelMode;
use super::strategy::AnalysisStrategy;
use super::Error;

/// Largest accepted search radius in metres.
pub const MAX_RADIUS_M: u32 = 50_000;
/// Radius used when the caller does not give one.
pub const DEFAULT_RADIUS_M: u32 = 5_000;

/// Unvalidated request as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequestInput {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius")]
    pub radius_m: u32,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub travel_mode: Option<String>,
}

fn default_radius() -> u32 {
    DEFAULT_RADIUS_M
}

impl AnalysisRequestInput {
    /// Request at a point with every other field defaulted.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_m: DEFAULT_RADIUS_M,
            categories: Vec::new(),
            travel_mode: None,
        }
    }

    /// Replace the radius.
    pub fn with_radius(mut self, radius_m: u32) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Replace the category list.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set the travel mode.
    pub fn with_travel_mode(mut self, mode: impl Into<String>) -> Self {
        self.travel_mode = Some(mode.into());
        self
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub coordinate: Coordinate,
    pub radius_m: u32,
    /// Never empty.
    pub categories: BTreeSet<FacilityCategory>,
    pub travel_mode: TravelMode,
}

impl AnalysisRequest {
    /// Validate `input` against the operating bounds and strategy defaults.
    pub fn validate(
        input: &AnalysisRequestInput,
        bounds: &OperatingBounds,
        strategy: &AnalysisStrategy,
    ) -> Result<Self, Error> {
        let coordinate = Coordinate::new(input.latitude, input.longitude)
            .map_err(|err| invalid("coordinate", err.to_string()))?;
        if !bounds.contains(&coordinate) {
            return Err(invalid(
                "coordinate",
                format!("coordinate {coordinate} lies outside the operating area ({bounds})"),
            ));
        }
        if !(1..=MAX_RADIUS_M).contains(&input.radius_m) {
            return Err(invalid(
                "radius_m",
                format!("radius must be between 1 and {MAX_RADIUS_M} metres"),
            ));
        }

        let mut categories = BTreeSet::new();
        for raw in &input.categories {
            let category: FacilityCategory = raw
                .parse()
                .map_err(|err: super::category::UnknownCategory| invalid("categories", err.to_string()))?;
            if category == FacilityCategory::Other {
                return Err(invalid("categories", "category `other` cannot be requested"));
            }
            categories.insert(category);
        }
        if categories.is_empty() {
            categories.extend(strategy.default_categories.iter().copied());
        }

        let travel_mode = match input.travel_mode.as_deref() {
            None => TravelMode::default(),
            Some(raw) => raw
                .parse()
                .map_err(|err: super::route::UnknownTravelMode| invalid("travel_mode", err.to_string()))?,
        };

        Ok(Self {
            coordinate,
            radius_m: input.radius_m,
            categories,
            travel_mode,
        })
    }
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::invalid_input(message).with_details(json!({ "field": field }))
}

#[cfg(test)]
mod tests {
    //! Pre-flight validation rules.

    use super::*;
    use crate::domain::ErrorCode;
    use rstest::{fixture, rstest};

    #[fixture]
    fn strategy() -> AnalysisStrategy {
        AnalysisStrategy::balanced()
    }

    fn validate(input: AnalysisRequestInput, strategy: &AnalysisStrategy) -> Result<AnalysisRequest, Error> {
        AnalysisRequest::validate(&input, &OperatingBounds::sri_lanka(), strategy)
    }

    fn field(err: &Error) -> Option<&str> {
        err.details().and_then(|details| details["field"].as_str())
    }

    #[rstest]
    fn london_is_out_of_bounds(strategy: AnalysisStrategy) {
        let err = validate(AnalysisRequestInput::at(51.5074, -0.1278), &strategy).expect_err("outside");
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(field(&err), Some("coordinate"));
    }

    #[rstest]
    #[case(0)]
    #[case(50_001)]
    fn radius_must_be_in_range(strategy: AnalysisStrategy, #[case] radius: u32) {
        let input = AnalysisRequestInput::at(6.9271, 79.8612).with_radius(radius);
        let err = validate(input, &strategy).expect_err("bad radius");
        assert_eq!(field(&err), Some("radius_m"));
    }

    #[rstest]
    #[case(vec!["school", "spaceport"])]
    #[case(vec!["other"])]
    fn rejects_unknown_or_catch_all_categories(strategy: AnalysisStrategy, #[case] categories: Vec<&str>) {
        let input = AnalysisRequestInput::at(6.9271, 79.8612).with_categories(categories);
        let err = validate(input, &strategy).expect_err("bad category");
        assert_eq!(field(&err), Some("categories"));
    }

    #[rstest]
    fn empty_categories_use_strategy_defaults(strategy: AnalysisStrategy) {
        let request = validate(AnalysisRequestInput::at(6.9271, 79.8612), &strategy).expect("valid");
        assert_eq!(
            request.categories,
            strategy.default_categories.iter().copied().collect::<BTreeSet<_>>()
        );
        assert_eq!(request.travel_mode, TravelMode::Drive);
    }

    #[rstest]
    fn parses_categories_and_mode(strategy: AnalysisStrategy) {
        let input = AnalysisRequestInput::at(7.2906, 80.6337)
            .with_categories(["hospital", "school", "school"])
            .with_travel_mode("walk");
        let request = validate(input, &strategy).expect("valid");
        assert_eq!(
            request.categories,
            BTreeSet::from([FacilityCategory::School, FacilityCategory::Hospital])
        );
        assert_eq!(request.travel_mode, TravelMode::Walk);
    }

    #[rstest]
    fn rejects_unknown_mode(strategy: AnalysisStrategy) {
        let input = AnalysisRequestInput::at(7.2906, 80.6337).with_travel_mode("teleport");
        let err = validate(input, &strategy).expect_err("bad mode");
        assert_eq!(field(&err), Some("travel_mode"));
    }
}
