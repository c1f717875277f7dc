//! Behaviour tests for end-to-end site analysis.
//!
//! Scenarios drive the service through scripted provider doubles and
//! in-process stores, so no network or database is required.

use std::cell::RefCell;
use std::sync::Arc;

use geo_analysis::domain::ports::CacheStore;
use geo_analysis::domain::{
    AnalysisBundle, AnalysisRequestInput, Branch, BranchStatus, ErrorCode, FacilityCategory,
    RouteTier, SiteAnalysisConfig, SiteAnalysisPorts, SiteAnalysisService,
};
use geo_analysis::outbound::cache::InMemoryCacheStore;
use geo_analysis::outbound::memory::{InMemoryBundleRepository, InMemoryCityStore};
use geo_analysis::test_support::{
    GatewayCalls, MutableClock, ScriptedGeoGateway, colombo_places, fixed_instant,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Runtime;

struct SiteAnalysisWorld {
    runtime: Runtime,
    gateway: RefCell<Option<Arc<ScriptedGeoGateway>>>,
    service: RefCell<Option<SiteAnalysisService>>,
    calls_before_last: RefCell<GatewayCalls>,
    outcome: RefCell<Option<Result<AnalysisBundle, ErrorCode>>>,
}

impl SiteAnalysisWorld {
    fn new() -> Self {
        Self {
            runtime: Runtime::new().expect("create runtime"),
            gateway: RefCell::new(None),
            service: RefCell::new(None),
            calls_before_last: RefCell::new(GatewayCalls::default()),
            outcome: RefCell::new(None),
        }
    }

    fn setup(&self, cities: InMemoryCityStore) {
        let gateway = Arc::new(ScriptedGeoGateway::new().with_places(colombo_places()));
        let clock = Arc::new(MutableClock::new(fixed_instant()));
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new(clock.clone()));
        let ports = SiteAnalysisPorts {
            gateway: gateway.clone(),
            cache,
            city_store: Arc::new(cities),
            repository: Arc::new(InMemoryBundleRepository::new()),
        };
        let service = SiteAnalysisService::new(ports, clock, SiteAnalysisConfig::default())
            .expect("default configuration is valid");
        self.gateway.replace(Some(gateway));
        self.service.replace(Some(service));
    }

    fn gateway(&self) -> Arc<ScriptedGeoGateway> {
        self.gateway
            .borrow()
            .as_ref()
            .map(Arc::clone)
            .expect("service should be set up")
    }

    fn analyse(&self, input: &AnalysisRequestInput) {
        let service = self
            .service
            .borrow()
            .clone()
            .expect("service should be set up");
        self.calls_before_last.replace(self.gateway().calls());
        let outcome = self
            .runtime
            .block_on(service.analyse(input))
            .map_err(|error| error.code());
        self.outcome.replace(Some(outcome));
    }

    fn with_bundle<F>(&self, f: F)
    where
        F: FnOnce(&AnalysisBundle),
    {
        let outcome = self.outcome.borrow();
        let bundle = outcome
            .as_ref()
            .expect("an analysis should have run")
            .as_ref()
            .expect("expected the analysis to succeed");
        f(bundle);
    }
}

fn colombo_schools_and_hospitals() -> AnalysisRequestInput {
    AnalysisRequestInput::at(6.9271, 79.8612)
        .with_radius(5_000)
        .with_categories(["school", "hospital"])
}

#[fixture]
fn world() -> SiteAnalysisWorld {
    SiteAnalysisWorld::new()
}

#[given("a site analysis service with Colombo facilities")]
fn a_site_analysis_service_with_colombo_facilities(world: &SiteAnalysisWorld) {
    world.setup(InMemoryCityStore::spatial());
}

#[given("a site analysis service with an empty city table")]
fn a_site_analysis_service_with_an_empty_city_table(world: &SiteAnalysisWorld) {
    world.setup(InMemoryCityStore::scan_only());
}

#[given("the provider is offline")]
fn the_provider_is_offline(world: &SiteAnalysisWorld) {
    world.gateway().go_offline();
}

#[when("the Colombo site is analysed for schools and hospitals")]
fn the_colombo_site_is_analysed(world: &SiteAnalysisWorld) {
    world.analyse(&colombo_schools_and_hospitals());
}

#[when("the Colombo site is analysed for schools and hospitals again")]
fn the_colombo_site_is_analysed_again(world: &SiteAnalysisWorld) {
    world.analyse(&colombo_schools_and_hospitals());
}

#[when("a site in London is analysed")]
fn a_site_in_london_is_analysed(world: &SiteAnalysisWorld) {
    world.analyse(&AnalysisRequestInput::at(51.5074, -0.1278));
}

#[then("no section is degraded")]
fn no_section_is_degraded(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| {
        assert!(
            bundle.degraded_branches().is_empty(),
            "degraded: {:?}",
            bundle.statuses
        );
    });
}

#[then("the facilities are limited to schools and hospitals")]
fn the_facilities_are_limited(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| {
        assert!(!bundle.pois.is_empty());
        assert!(bundle.pois.iter().all(|poi| matches!(
            poi.category,
            FacilityCategory::School | FacilityCategory::Hospital
        )));
    });
}

#[then("the nearest city is Colombo")]
fn the_nearest_city_is_colombo(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| {
        let nearest = bundle.nearby_cities.first().expect("a nearby city");
        assert_eq!(nearest.name, "Colombo");
        assert!(nearest.distance_km < 0.01);
    });
}

#[then("the bundle is flagged as cached")]
fn the_bundle_is_flagged_as_cached(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| {
        assert!(bundle.cached);
        assert_eq!(bundle.upstream_calls.total(), 0);
    });
}

#[then("the second analysis made no provider calls")]
fn the_second_analysis_made_no_provider_calls(world: &SiteAnalysisWorld) {
    let before = *world.calls_before_last.borrow();
    assert_eq!(world.gateway().calls(), before);
}

#[then("every route is a great-circle estimate")]
fn every_route_is_an_estimate(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| {
        assert!(!bundle.routes.is_empty());
        assert!(
            bundle
                .routes
                .iter()
                .all(|route| route.source_tier == RouteTier::Estimated)
        );
    });
}

#[then("the address section is marked as fallback")]
fn the_address_section_is_marked_as_fallback(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| {
        assert_eq!(bundle.status(Branch::Address), Some(BranchStatus::Fallback));
        assert!(bundle.address.is_stub);
    });
}

#[then("the request is rejected as invalid input")]
fn the_request_is_rejected(world: &SiteAnalysisWorld) {
    let outcome = world.outcome.borrow();
    let code = outcome
        .as_ref()
        .expect("an analysis should have run")
        .as_ref()
        .expect_err("expected the analysis to be rejected");
    assert_eq!(*code, ErrorCode::InvalidInput);
}

#[then("no provider calls were made")]
fn no_provider_calls_were_made(world: &SiteAnalysisWorld) {
    assert_eq!(world.gateway().calls().total(), 0);
}

#[then("nearby cities are reported")]
fn nearby_cities_are_reported(world: &SiteAnalysisWorld) {
    world.with_bundle(|bundle| assert!(!bundle.nearby_cities.is_empty()));
}

#[scenario(
    path = "tests/features/site_analysis.feature",
    name = "Analysing a Colombo site fills every section"
)]
fn analysing_a_colombo_site_fills_every_section(world: SiteAnalysisWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/site_analysis.feature",
    name = "A repeated analysis is served from the cache"
)]
fn a_repeated_analysis_is_served_from_the_cache(world: SiteAnalysisWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/site_analysis.feature",
    name = "A provider outage degrades sections without failing"
)]
fn a_provider_outage_degrades_sections(world: SiteAnalysisWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/site_analysis.feature",
    name = "Sites outside the operating box are rejected"
)]
fn sites_outside_the_operating_box_are_rejected(world: SiteAnalysisWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/site_analysis.feature",
    name = "An empty city table is seeded on first use"
)]
fn an_empty_city_table_is_seeded_on_first_use(world: SiteAnalysisWorld) {
    drop(world);
}
