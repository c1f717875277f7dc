//! Strategy presets that parameterise a single orchestrator.
//!
//! A strategy fixes the radius ladder, category grouping, result limits,
//! reference routes, imagery views, and cache lifetimes. It is chosen when
//! the service is built and never changes per request.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::category::{CategoryGrouping, FacilityCategory};
use super::imagery::ImageryView;
use super::ports::CacheCategory;
use super::Coordinate;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Named strategy preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fewest provider calls.
    CostMinimizing,
    #[default]
    Balanced,
    /// Widest coverage.
    Comprehensive,
}

impl StrategyKind {
    /// Snake-case identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CostMinimizing => "cost_minimizing",
            Self::Balanced => "balanced",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for unrecognised strategy names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy `{0}`; expected cost_minimizing, balanced or comprehensive")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cost_minimizing" => Ok(Self::CostMinimizing),
            "balanced" => Ok(Self::Balanced),
            "comprehensive" => Ok(Self::Comprehensive),
            _ => Err(UnknownStrategy(value.to_owned())),
        }
    }
}

/// Time-to-live for each cache category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub geocoding: Duration,
    pub admin_hierarchy: Duration,
    pub poi_data: Duration,
    pub imagery: Duration,
    pub routes: Duration,
}

impl CacheTtls {
    /// TTL for entries in `category`.
    pub fn for_category(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Geocoding => self.geocoding,
            CacheCategory::AdminHierarchy => self.admin_hierarchy,
            CacheCategory::PoiData => self.poi_data,
            CacheCategory::Imagery => self.imagery,
            CacheCategory::Routes => self.routes,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            geocoding: 2 * HOUR,
            admin_hierarchy: 2 * HOUR,
            poi_data: 6 * HOUR,
            imagery: 12 * HOUR,
            routes: 24 * HOUR,
        }
    }
}

/// A named origin for the site's reference routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLocation {
    pub name: String,
    pub coordinate: Coordinate,
}

impl ReferenceLocation {
    fn fixed(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_owned(),
            coordinate: Coordinate::from_static(latitude, longitude),
        }
    }
}

/// Colombo Fort, Kandy, and Galle, in that order.
pub fn default_reference_locations() -> Vec<ReferenceLocation> {
    vec![
        ReferenceLocation::fixed("Colombo Fort", 6.9344, 79.8428),
        ReferenceLocation::fixed("Kandy", 7.2906, 80.6337),
        ReferenceLocation::fixed("Galle", 6.0535, 80.2210),
    ]
}

/// Everything that differs between presets.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisStrategy {
    pub kind: StrategyKind,
    /// Search radii in metres, ascending.
    pub radius_ladder_m: Vec<u32>,
    /// Stop widening once this many unique places are found.
    pub poi_threshold: usize,
    /// Truncate the POI list to this length.
    pub max_pois: usize,
    pub grouping: CategoryGrouping,
    /// Used when the request names no categories.
    pub default_categories: Vec<FacilityCategory>,
    pub ttls: CacheTtls,
    /// Route origins, truncated to the preset's route count.
    pub reference_locations: Vec<ReferenceLocation>,
    pub imagery_views: Vec<ImageryView>,
}

impl AnalysisStrategy {
    /// Preset for `kind`.
    pub fn preset(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::CostMinimizing => Self::cost_minimizing(),
            StrategyKind::Balanced => Self::balanced(),
            StrategyKind::Comprehensive => Self::comprehensive(),
        }
    }

    /// Two narrow tiers, two grouped calls, long-lived POI and imagery
    /// entries.
    pub fn cost_minimizing() -> Self {
        Self {
            kind: StrategyKind::CostMinimizing,
            radius_ladder_m: vec![2_000, 3_000],
            poi_threshold: 10,
            max_pois: 15,
            grouping: CategoryGrouping::consolidated(),
            default_categories: vec![
                FacilityCategory::School,
                FacilityCategory::Hospital,
                FacilityCategory::Police,
                FacilityCategory::Bank,
                FacilityCategory::Supermarket,
                FacilityCategory::TransitStation,
            ],
            ttls: CacheTtls {
                poi_data: 12 * HOUR,
                imagery: 24 * HOUR,
                ..CacheTtls::default()
            },
            reference_locations: take(default_reference_locations(), 1),
            imagery_views: take(ImageryView::standard_views(), 1),
        }
    }

    /// Default preset.
    pub fn balanced() -> Self {
        Self {
            kind: StrategyKind::Balanced,
            radius_ladder_m: vec![2_000, 3_000, 5_000],
            poi_threshold: 12,
            max_pois: 25,
            grouping: CategoryGrouping::standard(),
            default_categories: vec![
                FacilityCategory::School,
                FacilityCategory::University,
                FacilityCategory::Hospital,
                FacilityCategory::Pharmacy,
                FacilityCategory::Police,
                FacilityCategory::Bank,
                FacilityCategory::PostOffice,
                FacilityCategory::GovernmentOffice,
                FacilityCategory::Supermarket,
                FacilityCategory::FuelStation,
                FacilityCategory::TransitStation,
                FacilityCategory::PlaceOfWorship,
            ],
            ttls: CacheTtls::default(),
            reference_locations: take(default_reference_locations(), 2),
            imagery_views: take(ImageryView::standard_views(), 2),
        }
    }

    /// Every searchable category, all reference routes, all views.
    pub fn comprehensive() -> Self {
        Self {
            kind: StrategyKind::Comprehensive,
            poi_threshold: 15,
            default_categories: FacilityCategory::SEARCHABLE.to_vec(),
            reference_locations: default_reference_locations(),
            imagery_views: ImageryView::standard_views(),
            ..Self::balanced()
        }
    }

    /// Radii actually searched for a request of `radius_m`: the preset's
    /// tiers strictly below it, then `radius_m` itself.
    pub fn effective_ladder(&self, radius_m: u32) -> Vec<u32> {
        let mut ladder: Vec<u32> = self
            .radius_ladder_m
            .iter()
            .copied()
            .filter(|tier| *tier < radius_m)
            .collect();
        ladder.push(radius_m);
        ladder
    }
}

impl Default for AnalysisStrategy {
    fn default() -> Self {
        Self::balanced()
    }
}

fn take<T>(mut items: Vec<T>, count: usize) -> Vec<T> {
    items.truncate(count);
    items
}

#[cfg(test)]
mod tests {
    //! Preset shape and radius ladder derivation.

    use super::*;
    use crate::domain::category::CategoryCatalogue;
    use rstest::rstest;

    #[rstest]
    #[case(StrategyKind::CostMinimizing, 1, 1, 10)]
    #[case(StrategyKind::Balanced, 2, 2, 12)]
    #[case(StrategyKind::Comprehensive, 3, 3, 15)]
    fn presets_scale_with_coverage(
        #[case] kind: StrategyKind,
        #[case] routes: usize,
        #[case] views: usize,
        #[case] threshold: usize,
    ) {
        let strategy = AnalysisStrategy::preset(kind);
        assert_eq!(strategy.kind, kind);
        assert_eq!(strategy.reference_locations.len(), routes);
        assert_eq!(strategy.imagery_views.len(), views);
        assert_eq!(strategy.poi_threshold, threshold);
        assert!(CategoryCatalogue::validate(&strategy.grouping).is_ok());
    }

    #[rstest]
    #[case(5_000, vec![2_000, 3_000, 5_000])]
    #[case(2_500, vec![2_000, 2_500])]
    #[case(1_000, vec![1_000])]
    #[case(10_000, vec![2_000, 3_000, 5_000, 10_000])]
    fn ladder_ends_at_request_radius(#[case] radius: u32, #[case] expected: Vec<u32>) {
        assert_eq!(AnalysisStrategy::balanced().effective_ladder(radius), expected);
    }

    #[test]
    fn cost_minimizing_keeps_entries_longer() {
        let cheap = AnalysisStrategy::cost_minimizing().ttls;
        let balanced = AnalysisStrategy::balanced().ttls;
        assert!(cheap.poi_data > balanced.poi_data);
        assert_eq!(cheap.routes, balanced.routes);
        assert_eq!(cheap.for_category(CacheCategory::Geocoding), 2 * HOUR);
    }

    #[rstest]
    #[case("cost-minimizing", StrategyKind::CostMinimizing)]
    #[case("Balanced", StrategyKind::Balanced)]
    #[case("comprehensive", StrategyKind::Comprehensive)]
    fn parses_strategy_names(#[case] raw: &str, #[case] expected: StrategyKind) {
        assert_eq!(raw.parse::<StrategyKind>(), Ok(expected));
    }
}
