//! The aggregate returned for one analysed site.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::Address;
use super::admin_hierarchy::AdministrativeHierarchy;
use super::category::FacilityCategory;
use super::cost::CostEstimate;
use super::imagery::ImageryReference;
use super::nearby_cities::City;
use super::poi_locator::PointOfInterest;
use super::resolution::{BranchStatus, Resolved, UpstreamCalls};
use super::route::{DirectionResult, TravelMode};
use super::strategy::StrategyKind;
use super::Coordinate;

/// Independent sections of the bundle, each produced by one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Address,
    Administrative,
    Pois,
    Routes,
    NearbyCities,
    Imagery,
}

impl Branch {
    /// Every branch, in report order.
    pub const ALL: [Self; 6] = [
        Self::Address,
        Self::Administrative,
        Self::Pois,
        Self::Routes,
        Self::NearbyCities,
        Self::Imagery,
    ];

    /// Snake-case identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Administrative => "administrative",
            Self::Pois => "pois",
            Self::Routes => "routes",
            Self::NearbyCities => "nearby_cities",
            Self::Imagery => "imagery",
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one branch fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchReport {
    pub status: BranchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<&Resolved<T>> for BranchReport {
    fn from(value: &Resolved<T>) -> Self {
        Self {
            status: value.status,
            error: value.error.clone(),
        }
    }
}

/// Everything known about a site, plus how each part was obtained.
///
/// Consumers should treat every section as advisory and consult
/// [`AnalysisBundle::statuses`] before trusting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub coordinate: Coordinate,
    /// Rounded `"lat,lon"` key the bundle is stored under.
    pub coordinate_key: String,
    pub strategy: StrategyKind,
    pub travel_mode: TravelMode,
    pub radius_m: u32,
    pub categories: Vec<FacilityCategory>,
    pub address: Address,
    pub administrative: AdministrativeHierarchy,
    pub pois: Vec<PointOfInterest>,
    pub routes: Vec<DirectionResult>,
    pub nearby_cities: Vec<City>,
    pub imagery: Vec<ImageryReference>,
    pub upstream_calls: UpstreamCalls,
    pub cost: CostEstimate,
    pub statuses: BTreeMap<Branch, BranchReport>,
    /// True when the request made no provider calls.
    pub cached: bool,
    /// Whether the bundle reached persistent storage.
    pub persisted: bool,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisBundle {
    /// Status of `branch`.
    pub fn status(&self, branch: Branch) -> Option<BranchStatus> {
        self.statuses.get(&branch).map(|report| report.status)
    }

    /// Branches that returned partial or fallback values.
    pub fn degraded_branches(&self) -> Vec<Branch> {
        self.statuses
            .iter()
            .filter(|(_, report)| report.status.is_degraded())
            .map(|(branch, _)| *branch)
            .collect()
    }
}
