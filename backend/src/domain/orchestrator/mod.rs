//! Site analysis orchestration.
//!
//! [`SiteAnalysisService`] validates a request, fans out six independent
//! branches as tasks, merges whatever they return into an
//! [`AnalysisBundle`], prices the provider calls, and upserts the bundle.
//! A failing or panicking branch only degrades its own section.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::join_all;
use mockable::Clock;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::address::{Address, AddressResolver};
use super::admin_hierarchy::{AdministrativeHierarchy, AdministrativeHierarchyResolver};
use super::bundle::{AnalysisBundle, Branch, BranchReport};
use super::cache_access::AnalysisCache;
use super::category::CategoryCatalogue;
use super::coordinate::{Coordinate, OperatingBounds};
use super::cost::{CostEstimator, RateTable};
use super::imagery::{ImageryReference, ImageryReferenceBuilder};
use super::nearby_cities::{City, NearbyCityConfig, NearbyCityLocator};
use super::poi_locator::{PoiLocator, PoiSearch, PointOfInterest};
use super::ports::{AnalysisBundleRepository, CacheStore, CityStore, GeoGateway};
use super::request::{AnalysisRequest, AnalysisRequestInput};
use super::resolution::{BranchStatus, Resolved, UpstreamCalls};
use super::route::DirectionResult;
use super::router::Router;
use super::strategy::AnalysisStrategy;
use super::upstream_guard::GuardedGeoGateway;
use super::Error;

/// Driven adapters the service depends on.
#[derive(Clone)]
pub struct SiteAnalysisPorts {
    pub gateway: Arc<dyn GeoGateway>,
    pub cache: Arc<dyn CacheStore>,
    pub city_store: Arc<dyn CityStore>,
    pub repository: Arc<dyn AnalysisBundleRepository>,
}

/// Service tuning chosen at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteAnalysisConfig {
    pub strategy: AnalysisStrategy,
    pub bounds: OperatingBounds,
    /// Bound on every external call.
    pub call_timeout: Duration,
    /// Provider calls allowed in flight across all requests.
    pub max_concurrent_calls: usize,
    pub nearby: NearbyCityConfig,
    pub rates: RateTable,
    pub budget_ceiling: f64,
}

impl Default for SiteAnalysisConfig {
    fn default() -> Self {
        Self {
            strategy: AnalysisStrategy::default(),
            bounds: OperatingBounds::default(),
            call_timeout: Duration::from_secs(5),
            max_concurrent_calls: 8,
            nearby: NearbyCityConfig::default(),
            rates: RateTable::default(),
            budget_ceiling: 0.50,
        }
    }
}

struct Components {
    address: AddressResolver,
    administrative: AdministrativeHierarchyResolver,
    pois: PoiLocator,
    router: Router,
    cities: NearbyCityLocator,
    imagery: ImageryReferenceBuilder,
    estimator: CostEstimator,
    repository: Arc<dyn AnalysisBundleRepository>,
    clock: Arc<dyn Clock + Send + Sync>,
    strategy: Arc<AnalysisStrategy>,
    bounds: OperatingBounds,
    call_timeout: Duration,
}

/// State shared by the branches of a single request.
#[derive(Default)]
struct RequestScope {
    address: OnceCell<Resolved<Address>>,
}

impl RequestScope {
    /// The request's one reverse-geocode, started by whichever branch asks
    /// first.
    async fn address(&self, components: &Components, coordinate: Coordinate) -> Resolved<Address> {
        self.address
            .get_or_init(|| components.address.resolve(coordinate))
            .await
            .clone()
    }
}

enum BranchOutput {
    Address(Resolved<Address>),
    Administrative(Resolved<AdministrativeHierarchy>),
    Pois(Resolved<Vec<PointOfInterest>>),
    Routes(Resolved<Vec<DirectionResult>>),
    NearbyCities(Resolved<Vec<City>>),
    Imagery(Resolved<Vec<ImageryReference>>),
}

#[derive(Default)]
struct BranchResults {
    address: Option<Resolved<Address>>,
    administrative: Option<Resolved<AdministrativeHierarchy>>,
    pois: Option<Resolved<Vec<PointOfInterest>>>,
    routes: Option<Resolved<Vec<DirectionResult>>>,
    nearby_cities: Option<Resolved<Vec<City>>>,
    imagery: Option<Resolved<Vec<ImageryReference>>>,
    failures: Vec<(Branch, String)>,
}

impl BranchResults {
    fn record(&mut self, output: BranchOutput) {
        match output {
            BranchOutput::Address(value) => self.address = Some(value),
            BranchOutput::Administrative(value) => self.administrative = Some(value),
            BranchOutput::Pois(value) => self.pois = Some(value),
            BranchOutput::Routes(value) => self.routes = Some(value),
            BranchOutput::NearbyCities(value) => self.nearby_cities = Some(value),
            BranchOutput::Imagery(value) => self.imagery = Some(value),
        }
    }
}

fn or_fallback<T>(
    slot: Option<Resolved<T>>,
    branch: Branch,
    failures: &[(Branch, String)],
    fallback: impl FnOnce() -> T,
) -> Resolved<T> {
    slot.unwrap_or_else(|| {
        let reason = failures
            .iter()
            .find(|(failed, _)| *failed == branch)
            .map_or_else(|| format!("{branch} branch did not complete"), |(_, reason)| reason.clone());
        Resolved::fallback(fallback(), UpstreamCalls::NONE, reason)
    })
}

/// Produces analysis bundles for coordinates.
#[derive(Clone)]
pub struct SiteAnalysisService {
    components: Arc<Components>,
}

impl SiteAnalysisService {
    /// Build the service, validating the category tables and cost settings.
    pub fn new(
        ports: SiteAnalysisPorts,
        clock: Arc<dyn Clock + Send + Sync>,
        config: SiteAnalysisConfig,
    ) -> Result<Self, Error> {
        let catalogue = CategoryCatalogue::validate(&config.strategy.grouping)
            .map_err(|err| Error::internal(format!("category catalogue is inconsistent: {err}")))?;
        let estimator = CostEstimator::new(config.rates, config.budget_ceiling)
            .map_err(|err| Error::invalid_input(err.to_string()))?;
        let strategy = Arc::new(config.strategy);
        let gateway: Arc<dyn GeoGateway> = Arc::new(GuardedGeoGateway::new(
            ports.gateway,
            config.max_concurrent_calls,
            config.call_timeout,
        ));
        let cache = AnalysisCache::new(ports.cache, strategy.ttls, config.call_timeout);

        let components = Components {
            address: AddressResolver::new(Arc::clone(&gateway), cache.clone()),
            administrative: AdministrativeHierarchyResolver::new(cache.clone()),
            pois: PoiLocator::new(Arc::clone(&gateway), cache.clone(), catalogue, Arc::clone(&strategy)),
            router: Router::new(Arc::clone(&gateway), cache.clone()),
            cities: NearbyCityLocator::new(ports.city_store, config.nearby, config.call_timeout),
            imagery: ImageryReferenceBuilder::new(gateway, cache, strategy.imagery_views.clone()),
            estimator,
            repository: ports.repository,
            clock,
            strategy,
            bounds: config.bounds,
            call_timeout: config.call_timeout,
        };
        Ok(Self {
            components: Arc::new(components),
        })
    }

    /// Strategy in force.
    pub fn strategy(&self) -> &AnalysisStrategy {
        &self.components.strategy
    }

    /// Pre-flight validation only.
    pub fn validate(&self, input: &AnalysisRequestInput) -> Result<AnalysisRequest, Error> {
        AnalysisRequest::validate(input, &self.components.bounds, &self.components.strategy)
    }

    /// Analyse a site.
    ///
    /// Only invalid input is an error; every other problem degrades the
    /// affected section. Dropping the returned future aborts all branches.
    pub async fn analyse(&self, input: &AnalysisRequestInput) -> Result<AnalysisBundle, Error> {
        self.analyse_until(input, std::future::pending()).await
    }

    /// Like [`Self::analyse`], but gives up with
    /// [`ErrorCode::Cancelled`](super::ErrorCode::Cancelled) as soon as
    /// `cancelled` resolves, aborting in-flight branches.
    pub async fn analyse_until<C>(
        &self,
        input: &AnalysisRequestInput,
        cancelled: C,
    ) -> Result<AnalysisBundle, Error>
    where
        C: Future<Output = ()>,
    {
        let request = self.validate(input)?;
        let mut branches = self.spawn_branches(&request);

        let results = tokio::select! {
            results = collect(&mut branches) => results,
            () = cancelled => {
                warn!(coordinate = %request.coordinate.key(), "analysis cancelled by caller");
                return Err(Error::cancelled("analysis cancelled before completion"));
            }
        };

        let bundle = self.assemble(&request, results);
        Ok(self.persist(bundle).await)
    }

    /// Last stored bundle for the rounded `coordinate`.
    pub async fn stored_bundle(&self, coordinate: Coordinate) -> Result<Option<AnalysisBundle>, Error> {
        let key = coordinate.key();
        let lookup = self.components.repository.find_by_coordinate_key(&key);
        match tokio::time::timeout(self.components.call_timeout, lookup).await {
            Ok(Ok(bundle)) => Ok(bundle),
            Ok(Err(err)) => Err(Error::upstream_unavailable(err.to_string())),
            Err(_) => Err(Error::upstream_unavailable("bundle lookup timed out")),
        }
    }

    fn spawn_branches(&self, request: &AnalysisRequest) -> JoinSet<(Branch, Result<BranchOutput, String>)> {
        let scope = Arc::new(RequestScope::default());
        let mut set = JoinSet::new();
        for branch in Branch::ALL {
            let components = Arc::clone(&self.components);
            let scope = Arc::clone(&scope);
            let request = request.clone();
            set.spawn(async move {
                let run = run_branch(branch, &components, &scope, &request);
                let outcome = AssertUnwindSafe(run)
                    .catch_unwind()
                    .await
                    .map_err(|panic| panic_message(branch, panic.as_ref()));
                (branch, outcome)
            });
        }
        set
    }

    fn assemble(&self, request: &AnalysisRequest, results: BranchResults) -> AnalysisBundle {
        let coordinate = request.coordinate;
        let BranchResults {
            address,
            administrative,
            pois,
            routes,
            nearby_cities,
            imagery,
            failures,
        } = results;
        let address = or_fallback(address, Branch::Address, &failures, || Address::stub(coordinate));
        let administrative = or_fallback(
            administrative,
            Branch::Administrative,
            &failures,
            AdministrativeHierarchy::unknown,
        );
        let pois = or_fallback(pois, Branch::Pois, &failures, Vec::new);
        let routes = or_fallback(routes, Branch::Routes, &failures, Vec::new);
        let nearby_cities = or_fallback(nearby_cities, Branch::NearbyCities, &failures, Vec::new);
        let imagery = or_fallback(imagery, Branch::Imagery, &failures, Vec::new);

        let statuses = [
            (Branch::Address, BranchReport::from(&address)),
            (Branch::Administrative, BranchReport::from(&administrative)),
            (Branch::Pois, BranchReport::from(&pois)),
            (Branch::Routes, BranchReport::from(&routes)),
            (Branch::NearbyCities, BranchReport::from(&nearby_cities)),
            (Branch::Imagery, BranchReport::from(&imagery)),
        ]
        .into_iter()
        .collect();
        let upstream_calls = [
            address.calls,
            administrative.calls,
            pois.calls,
            routes.calls,
            nearby_cities.calls,
            imagery.calls,
        ]
        .into_iter()
        .sum::<UpstreamCalls>();
        let cost = self.components.estimator.estimate(&upstream_calls);

        AnalysisBundle {
            coordinate,
            coordinate_key: coordinate.key(),
            strategy: self.components.strategy.kind,
            travel_mode: request.travel_mode,
            radius_m: request.radius_m,
            categories: request.categories.iter().copied().collect(),
            address: address.value,
            administrative: administrative.value,
            pois: pois.value,
            routes: routes.value,
            nearby_cities: nearby_cities.value,
            imagery: imagery.value,
            cached: upstream_calls.total() == 0,
            upstream_calls,
            cost,
            statuses,
            persisted: false,
            generated_at: self.components.clock.utc(),
        }
    }

    async fn persist(&self, mut bundle: AnalysisBundle) -> AnalysisBundle {
        bundle.persisted = true;
        let upsert = self.components.repository.upsert(&bundle);
        let failure = match tokio::time::timeout(self.components.call_timeout, upsert).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("bundle upsert timed out".to_owned()),
        };
        if let Some(error) = failure {
            warn!(coordinate = %bundle.coordinate_key, %error, "bundle persistence failed");
            bundle.persisted = false;
        }

        info!(
            coordinate = %bundle.coordinate_key,
            strategy = bundle.strategy.as_str(),
            upstream_calls = bundle.upstream_calls.total(),
            estimated_cost = bundle.cost.total_cost,
            within_budget = bundle.cost.within_budget,
            cached = bundle.cached,
            persisted = bundle.persisted,
            degraded = ?bundle.degraded_branches(),
            "site analysis complete"
        );
        bundle
    }
}

async fn run_branch(
    branch: Branch,
    components: &Components,
    scope: &RequestScope,
    request: &AnalysisRequest,
) -> BranchOutput {
    let coordinate = request.coordinate;
    match branch {
        Branch::Address => BranchOutput::Address(scope.address(components, coordinate).await),
        Branch::Administrative => BranchOutput::Administrative(
            components
                .administrative
                .resolve(coordinate, || scope.address(components, coordinate))
                .await,
        ),
        Branch::Pois => {
            let search = PoiSearch {
                center: coordinate,
                radius_m: request.radius_m,
                categories: request.categories.clone(),
            };
            BranchOutput::Pois(components.pois.locate(&search).await)
        }
        Branch::Routes => BranchOutput::Routes(reference_routes(components, request).await),
        Branch::NearbyCities => BranchOutput::NearbyCities(components.cities.locate(coordinate).await),
        Branch::Imagery => BranchOutput::Imagery(components.imagery.build(coordinate).await),
    }
}

/// Directions from each reference location to the site, concurrently.
async fn reference_routes(components: &Components, request: &AnalysisRequest) -> Resolved<Vec<DirectionResult>> {
    let lookups = components.strategy.reference_locations.iter().map(|origin| async move {
        let mut resolved = components
            .router
            .directions(origin.coordinate, request.coordinate, request.travel_mode)
            .await;
        resolved.value.origin_name = Some(origin.name.clone());
        resolved
    });
    let resolved = join_all(lookups).await;

    let status = BranchStatus::combine(resolved.iter().map(|route| route.status));
    let calls = resolved.iter().map(|route| route.calls).sum();
    let errors: Vec<String> = resolved.iter().filter_map(|route| route.error.clone()).collect();
    Resolved {
        value: resolved.into_iter().map(|route| route.value).collect(),
        status,
        error: (!errors.is_empty()).then(|| errors.join(" | ")),
        calls,
    }
}

async fn collect(set: &mut JoinSet<(Branch, Result<BranchOutput, String>)>) -> BranchResults {
    let mut results = BranchResults::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(output))) => results.record(output),
            Ok((branch, Err(reason))) => {
                warn!(branch = branch.as_str(), %reason, "analysis branch failed; substituting fallback");
                results.failures.push((branch, reason));
            }
            Err(error) => warn!(%error, "analysis branch task did not finish"),
        }
    }
    results
}

fn panic_message(branch: Branch, panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    format!("{branch} branch panicked: {detail}")
}
