//! Nearby facilities found by widening the search radius tier by tier.
//!
//! Requested categories are batched into at most four provider calls per
//! tier. Tiers run strictly in order and stop once enough unique places are
//! known; the calls within one tier run concurrently.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Coordinate;
use super::cache_access::AnalysisCache;
use super::category::{CategoryCatalogue, FacilityCategory, GroupSearch};
use super::ports::{CacheCategory, CacheKey, GeoGateway, PlaceSearchRequest, ProviderPlace};
use super::resolution::{Resolved, UpstreamCalls};
use super::strategy::AnalysisStrategy;

/// Provider page size for one nearby search.
const MAX_RESULTS_PER_CALL: u8 = 20;

/// A classified facility near the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub name: String,
    pub category: FacilityCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub coordinate: Coordinate,
    pub distance_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PointOfInterest {
    /// Identity used for de-duplication: the provider id when present,
    /// otherwise the lower-cased name at key precision.
    pub fn dedup_key(&self) -> String {
        match self.identifier.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => format!("id:{id}"),
            _ => format!(
                "name:{}@{}",
                self.name.trim().to_lowercase(),
                self.coordinate.key()
            ),
        }
    }
}

/// One POI lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiSearch {
    pub center: Coordinate,
    pub radius_m: u32,
    pub categories: BTreeSet<FacilityCategory>,
}

/// Runs the radius ladder for a strategy.
pub struct PoiLocator {
    gateway: Arc<dyn GeoGateway>,
    cache: AnalysisCache,
    catalogue: CategoryCatalogue,
    strategy: Arc<AnalysisStrategy>,
}

impl PoiLocator {
    pub fn new(
        gateway: Arc<dyn GeoGateway>,
        cache: AnalysisCache,
        catalogue: CategoryCatalogue,
        strategy: Arc<AnalysisStrategy>,
    ) -> Self {
        Self {
            gateway,
            cache,
            catalogue,
            strategy,
        }
    }

    /// Facilities of the requested categories, nearest first.
    ///
    /// Failed group calls are skipped. Only complete results are cached.
    pub async fn locate(&self, search: &PoiSearch) -> Resolved<Vec<PointOfInterest>> {
        let categories: Vec<&str> = search.categories.iter().map(|c| c.as_str()).collect();
        let key = CacheKey::builder(CacheCategory::PoiData, search.center)
            .param("radius_m", search.radius_m)
            .param("categories", categories.join(","))
            .param("strategy", self.strategy.kind)
            .build();
        if let Some(pois) = self.cache.fetch(&key, CacheCategory::PoiData).await {
            return Resolved::cached(pois);
        }

        let plan = self.strategy.grouping.plan(&search.categories);
        let mut collected: HashMap<String, PointOfInterest> = HashMap::new();
        let mut calls = UpstreamCalls::NONE;
        let mut attempted = 0_usize;
        let mut failed = 0_usize;
        let mut last_error = None;

        for radius_m in self.strategy.effective_ladder(search.radius_m) {
            let fetches = plan
                .iter()
                .map(|group| self.fetch_group(search, group, radius_m));
            let outcomes = join_all(fetches).await;
            calls += UpstreamCalls::poi_groups(u32::try_from(outcomes.len()).unwrap_or(u32::MAX));
            attempted += outcomes.len();

            for outcome in outcomes {
                match outcome {
                    Ok(places) => {
                        for poi in places {
                            collected.entry(poi.dedup_key()).or_insert(poi);
                        }
                    }
                    Err(error) => {
                        failed += 1;
                        last_error = Some(error);
                    }
                }
            }

            debug!(radius_m, unique = collected.len(), threshold = self.strategy.poi_threshold, "poi tier complete");
            if collected.len() >= self.strategy.poi_threshold {
                break;
            }
        }

        let mut pois: Vec<PointOfInterest> = collected.into_values().collect();
        sort_by_distance(&mut pois);
        pois.truncate(self.strategy.max_pois);

        match last_error {
            None => {
                self.cache.store(&key, CacheCategory::PoiData, &pois).await;
                Resolved::fresh(pois, calls)
            }
            Some(error) if failed == attempted => Resolved::fallback(pois, calls, error),
            Some(error) => Resolved::partial(pois, calls, error),
        }
    }

    async fn fetch_group(
        &self,
        search: &PoiSearch,
        group: &GroupSearch,
        radius_m: u32,
    ) -> Result<Vec<PointOfInterest>, String> {
        let request = PlaceSearchRequest {
            center: search.center.rounded(),
            radius_m,
            type_tags: group.type_tags.clone(),
            max_results: MAX_RESULTS_PER_CALL,
        };
        match self.gateway.search_places(&request).await {
            Ok(places) => Ok(places
                .into_iter()
                .filter_map(|place| self.annotate(search, place))
                .collect()),
            Err(error) if error.is_not_found() => Ok(Vec::new()),
            Err(error) => {
                warn!(group = %group.name, radius_m, %error, "poi group fetch failed; skipping");
                Err(format!("{}: {error}", group.name))
            }
        }
    }

    /// Classify and measure a place, dropping it when its category was not
    /// requested.
    fn annotate(&self, search: &PoiSearch, place: ProviderPlace) -> Option<PointOfInterest> {
        let classification = self
            .catalogue
            .classify(&place.type_tags, &place.name, &search.categories);
        if !search.categories.contains(&classification.category) {
            return None;
        }
        Some(PointOfInterest {
            identifier: place.id,
            name: place.name,
            category: classification.category,
            subcategory: classification.subcategory,
            distance_meters: search.center.distance_meters(&place.coordinate),
            coordinate: place.coordinate,
            rating: place.rating,
            address: place.address,
        })
    }
}

/// Ascending distance, ties broken by name then identifier so the order is
/// stable across runs.
fn sort_by_distance(pois: &mut [PointOfInterest]) {
    pois.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}
