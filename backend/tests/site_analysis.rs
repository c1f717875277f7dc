//! Cross-module behaviour of the site analysis service over in-process
//! adapters.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use geo_analysis::domain::ports::{CacheStore, CityStore, GeoGatewayError};
use geo_analysis::domain::{
    AnalysisRequestInput, Branch, BranchStatus, CostEstimator, ErrorCode, FacilityCategory,
    RateTable, RouteTier, SiteAnalysisConfig, SiteAnalysisPorts, SiteAnalysisService,
    UpstreamCalls,
};
use geo_analysis::outbound::cache::InMemoryCacheStore;
use geo_analysis::outbound::memory::{InMemoryBundleRepository, InMemoryCityStore};
use geo_analysis::test_support::{MutableClock, ScriptedGeoGateway, colombo_places, fixed_instant};
use rstest::{fixture, rstest};

struct Site {
    gateway: Arc<ScriptedGeoGateway>,
    clock: Arc<MutableClock>,
    cities: Arc<InMemoryCityStore>,
    service: SiteAnalysisService,
}

#[fixture]
fn site() -> Site {
    site_with(InMemoryCityStore::spatial())
}

fn site_with(cities: InMemoryCityStore) -> Site {
    let gateway = Arc::new(ScriptedGeoGateway::new().with_places(colombo_places()));
    let clock = Arc::new(MutableClock::new(fixed_instant()));
    let cities = Arc::new(cities);
    let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new(clock.clone()));
    let ports = SiteAnalysisPorts {
        gateway: gateway.clone(),
        cache,
        city_store: cities.clone(),
        repository: Arc::new(InMemoryBundleRepository::new()),
    };
    let service = SiteAnalysisService::new(ports, clock.clone(), SiteAnalysisConfig::default())
        .expect("default configuration is valid");
    Site {
        gateway,
        clock,
        cities,
        service,
    }
}

fn colombo(categories: &[&str]) -> AnalysisRequestInput {
    AnalysisRequestInput::at(6.9271, 79.8612)
        .with_radius(5_000)
        .with_categories(categories.iter().copied())
}

#[rstest]
#[case(51.5074, -0.1278)]
#[case(13.0827, 80.2707)]
#[case(6.9271, 95.0)]
#[case(f64::NAN, 79.8612)]
#[tokio::test]
async fn requests_outside_the_box_make_no_calls(
    site: Site,
    #[case] latitude: f64,
    #[case] longitude: f64,
) {
    let err = site
        .service
        .analyse(&AnalysisRequestInput::at(latitude, longitude))
        .await
        .expect_err("coordinate is rejected");

    assert_eq!(err.code(), ErrorCode::InvalidInput);
    assert_eq!(site.gateway.calls().total(), 0);
}

#[rstest]
#[tokio::test]
async fn colombo_scenario_stays_within_requested_categories(site: Site) {
    let bundle = site
        .service
        .analyse(&colombo(&["school", "hospital"]))
        .await
        .expect("analysis succeeds");

    assert!(!bundle.pois.is_empty());
    assert!(bundle.pois.iter().all(|poi| {
        matches!(poi.category, FacilityCategory::School | FacilityCategory::Hospital)
    }));
    let nearest = bundle.nearby_cities.first().expect("a nearby city");
    assert_eq!(nearest.name, "Colombo");
    assert!(nearest.distance_km < 0.01, "got {}", nearest.distance_km);
}

#[rstest]
#[tokio::test]
async fn repeat_within_ttl_is_cached_and_byte_identical(site: Site) {
    let request = colombo(&["school", "hospital"]);
    let first = site.service.analyse(&request).await.expect("first analysis");
    let calls_after_first = site.gateway.calls();
    site.clock.advance(Duration::from_secs(30 * 60));

    let second = site.service.analyse(&request).await.expect("second analysis");

    assert!(second.cached);
    assert_eq!(second.upstream_calls, UpstreamCalls::NONE);
    assert_eq!(site.gateway.calls(), calls_after_first);
    assert_eq!(
        serde_json::to_vec(&first.pois).expect("serialise"),
        serde_json::to_vec(&second.pois).expect("serialise"),
    );
}

#[rstest]
#[tokio::test]
async fn expired_entries_are_fetched_again(site: Site) {
    let request = colombo(&["school"]);
    site.service.analyse(&request).await.expect("first analysis");
    site.clock.advance(Duration::from_secs(25 * 60 * 60));

    let bundle = site.service.analyse(&request).await.expect("second analysis");

    assert!(!bundle.cached);
    assert_eq!(bundle.upstream_calls.geocode, 1);
    assert_eq!(site.gateway.calls().reverse_geocode, 2);
}

#[rstest]
#[tokio::test]
async fn duplicate_places_appear_once_in_distance_order(site: Site) {
    let bundle = site
        .service
        .analyse(&colombo(&["school", "hospital", "pharmacy"]))
        .await
        .expect("analysis succeeds");

    let identifiers: Vec<&str> = bundle
        .pois
        .iter()
        .filter_map(|poi| poi.identifier.as_deref())
        .collect();
    let unique: BTreeSet<&str> = identifiers.iter().copied().collect();
    assert_eq!(identifiers.len(), unique.len(), "{identifiers:?}");
    let dispensaries = bundle
        .pois
        .iter()
        .filter(|poi| poi.name == "Kollupitiya Dispensary")
        .count();
    assert_eq!(dispensaries, 1);
    assert!(
        bundle
            .pois
            .windows(2)
            .all(|pair| pair[0].distance_meters <= pair[1].distance_meters)
    );
}

#[rstest]
#[tokio::test]
async fn failing_route_tiers_fall_back_to_estimates(site: Site) {
    site.gateway
        .fail_primary_routes(GeoGatewayError::transport("primary down"));
    site.gateway
        .fail_legacy_routes(GeoGatewayError::rate_limited("legacy quota exhausted"));

    let bundle = site
        .service
        .analyse(&colombo(&["school"]))
        .await
        .expect("analysis succeeds");

    assert!(!bundle.routes.is_empty());
    assert!(
        bundle
            .routes
            .iter()
            .all(|route| route.source_tier == RouteTier::Estimated)
    );
    assert_eq!(bundle.status(Branch::Routes), Some(BranchStatus::Fallback));
    assert_eq!(bundle.status(Branch::Address), Some(BranchStatus::Fresh));
}

#[rstest]
#[tokio::test]
async fn empty_city_table_heals_itself() {
    let site = site_with(InMemoryCityStore::scan_only());
    assert!(site.cities.all_cities().await.expect("list").is_empty());

    let bundle = site
        .service
        .analyse(&colombo(&["school"]))
        .await
        .expect("analysis succeeds");

    assert!(!bundle.nearby_cities.is_empty());
    assert!(!site.cities.all_cities().await.expect("list").is_empty());

    let again = site
        .service
        .analyse(&colombo(&["hospital"]))
        .await
        .expect("analysis succeeds");
    assert!(!again.nearby_cities.is_empty());
}

#[rstest]
#[tokio::test]
async fn concurrent_requests_keep_separate_counts(site: Site) {
    let fort = AnalysisRequestInput::at(6.9344, 79.8428).with_categories(["school"]);
    let kollupitiya = AnalysisRequestInput::at(6.9110, 79.8490).with_categories(["hospital"]);

    let (first, second) = tokio::join!(site.service.analyse(&fort), site.service.analyse(&kollupitiya));
    let first = first.expect("first analysis");
    let second = second.expect("second analysis");

    assert_eq!(first.upstream_calls.geocode, 1);
    assert_eq!(second.upstream_calls.geocode, 1);
    assert_eq!(site.gateway.calls().reverse_geocode, 2);
}

#[rstest]
#[case(UpstreamCalls { geocode: 1, poi_group: 2, route: 2, imagery: 2 })]
#[case(UpstreamCalls { geocode: 0, poi_group: 7, route: 0, imagery: 1 })]
#[case(UpstreamCalls::NONE)]
fn doubling_poi_calls_never_lowers_cost(#[case] calls: UpstreamCalls) {
    let estimator = CostEstimator::new(RateTable::default(), 0.5).expect("valid rates");
    let doubled = UpstreamCalls {
        poi_group: calls.poi_group * 2,
        ..calls
    };
    let more = calls + UpstreamCalls {
        route: 1,
        ..UpstreamCalls::NONE
    };

    let base = estimator.estimate(&calls).total_cost;
    assert!(estimator.estimate(&doubled).total_cost >= base);
    assert!(estimator.estimate(&more).total_cost >= base);
}
