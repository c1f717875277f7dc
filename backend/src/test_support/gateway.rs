//! Scripted geospatial provider.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::domain::Coordinate;
use crate::domain::RouteStep;
use crate::domain::ports::{
    GeoGateway, GeoGatewayError, PlaceSearchRequest, ProviderPlace, ProviderRoute,
    ReverseGeocodeResult, RouteRequest, StaticMapOptions,
};

use super::fixtures::colombo_reverse_geocode;

/// Calls the scripted gateway has served, by endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub reverse_geocode: u32,
    pub search_places: u32,
    pub compute_route: u32,
    pub legacy_directions: u32,
    pub static_image_url: u32,
}

impl GatewayCalls {
    /// Every call, regardless of endpoint.
    pub const fn total(&self) -> u32 {
        self.reverse_geocode
            + self.search_places
            + self.compute_route
            + self.legacy_directions
            + self.static_image_url
    }
}

#[derive(Default)]
struct Counters {
    reverse_geocode: AtomicU32,
    search_places: AtomicU32,
    compute_route: AtomicU32,
    legacy_directions: AtomicU32,
    static_image_url: AtomicU32,
    completed: AtomicU32,
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[derive(Default)]
struct Script {
    places: Vec<ProviderPlace>,
    geocode: Option<ReverseGeocodeResult>,
    geocode_failure: Option<GeoGatewayError>,
    primary_route_failure: Option<GeoGatewayError>,
    legacy_route_failure: Option<GeoGatewayError>,
    failing_tags: BTreeSet<String>,
    imagery_failure: Option<GeoGatewayError>,
}

/// In-memory provider that answers from a scripted place catalogue.
///
/// Searches filter the catalogue by type tag and radius. Routes are derived
/// from great-circle distance. Each endpoint can be switched to fail at any
/// point, and every call is counted. An optional latency delays every
/// network-shaped endpoint before it answers.
#[derive(Default)]
pub struct ScriptedGeoGateway {
    script: Mutex<Script>,
    counters: Counters,
    latency: Option<Duration>,
}

impl ScriptedGeoGateway {
    /// Gateway answering with the Colombo address and no places.
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.script().geocode = Some(colombo_reverse_geocode());
        gateway
    }

    /// Replace the place catalogue.
    #[must_use]
    pub fn with_places(self, places: Vec<ProviderPlace>) -> Self {
        self.script().places = places;
        self
    }

    /// Delay every async endpoint by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_reverse_geocode(&self, error: GeoGatewayError) {
        self.script().geocode_failure = Some(error);
    }

    pub fn fail_primary_routes(&self, error: GeoGatewayError) {
        self.script().primary_route_failure = Some(error);
    }

    pub fn fail_legacy_routes(&self, error: GeoGatewayError) {
        self.script().legacy_route_failure = Some(error);
    }

    /// Fail any search that asks for `tag`.
    pub fn fail_searches_for(&self, tag: &str) {
        self.script().failing_tags.insert(tag.to_owned());
    }

    pub fn fail_imagery(&self, error: GeoGatewayError) {
        self.script().imagery_failure = Some(error);
    }

    /// Fail every endpoint with a transport error.
    pub fn go_offline(&self) {
        let error = GeoGatewayError::transport("provider offline");
        let mut script = self.script();
        script.geocode_failure = Some(error.clone());
        script.primary_route_failure = Some(error.clone());
        script.legacy_route_failure = Some(error.clone());
        script.imagery_failure = Some(error);
        let tags: Vec<String> = script
            .places
            .iter()
            .flat_map(|place| place.type_tags.iter().cloned())
            .collect();
        script.failing_tags.extend(tags);
        script.failing_tags.insert("*".to_owned());
    }

    /// Clear every scripted failure.
    pub fn recover(&self) {
        let mut script = self.script();
        script.geocode_failure = None;
        script.primary_route_failure = None;
        script.legacy_route_failure = None;
        script.imagery_failure = None;
        script.failing_tags.clear();
    }

    pub fn calls(&self) -> GatewayCalls {
        GatewayCalls {
            reverse_geocode: self.counters.reverse_geocode.load(Ordering::SeqCst),
            search_places: self.counters.search_places.load(Ordering::SeqCst),
            compute_route: self.counters.compute_route.load(Ordering::SeqCst),
            legacy_directions: self.counters.legacy_directions.load(Ordering::SeqCst),
            static_image_url: self.counters.static_image_url.load(Ordering::SeqCst),
        }
    }

    /// Async endpoint calls that ran to the end, including failures.
    pub fn completed_calls(&self) -> u32 {
        self.counters.completed.load(Ordering::SeqCst)
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn respond<T>(&self, answer: impl FnOnce(&Script) -> T) -> T {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let outcome = answer(&*self.script());
        bump(&self.counters.completed);
        outcome
    }
}

fn synthetic_route(request: &RouteRequest, detour: f64, label: &str) -> ProviderRoute {
    let distance_meters = (request.origin.distance_meters(&request.destination) * detour).round();
    let speed_mps = request.mode.average_speed_kmh() * 1_000.0 / 3_600.0;
    let duration_seconds = (distance_meters / speed_mps).round();
    let half = (distance_meters / 2.0).round();
    ProviderRoute {
        distance_meters,
        duration_seconds,
        steps: vec![
            RouteStep {
                instruction: format!("{label}: leave the origin"),
                distance_meters: half,
                duration_seconds: (duration_seconds / 2.0).round(),
            },
            RouteStep {
                instruction: format!("{label}: arrive at the site"),
                distance_meters: distance_meters - half,
                duration_seconds: duration_seconds - (duration_seconds / 2.0).round(),
            },
        ],
    }
}

#[async_trait]
impl GeoGateway for ScriptedGeoGateway {
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, GeoGatewayError> {
        bump(&self.counters.reverse_geocode);
        self.respond(|script| {
            if let Some(error) = &script.geocode_failure {
                return Err(error.clone());
            }
            script.geocode.clone().ok_or_else(|| {
                GeoGatewayError::not_found(format!("no address near {}", coordinate.key()))
            })
        })
        .await
    }

    async fn search_places(
        &self,
        request: &PlaceSearchRequest,
    ) -> Result<Vec<ProviderPlace>, GeoGatewayError> {
        bump(&self.counters.search_places);
        self.respond(|script| {
            if script.failing_tags.contains("*")
                || request.type_tags.iter().any(|tag| script.failing_tags.contains(tag))
            {
                return Err(GeoGatewayError::rate_limited("scripted search failure"));
            }
            let radius = f64::from(request.radius_m);
            let mut found: Vec<ProviderPlace> = script
                .places
                .iter()
                .filter(|place| place.type_tags.iter().any(|tag| request.type_tags.contains(tag)))
                .filter(|place| place.coordinate.distance_meters(&request.center) <= radius)
                .cloned()
                .collect();
            if found.is_empty() {
                return Err(GeoGatewayError::not_found("no places matched"));
            }
            found.truncate(usize::from(request.max_results));
            Ok(found)
        })
        .await
    }

    async fn compute_route(&self, request: &RouteRequest) -> Result<ProviderRoute, GeoGatewayError> {
        bump(&self.counters.compute_route);
        self.respond(|script| match &script.primary_route_failure {
            Some(error) => Err(error.clone()),
            None => Ok(synthetic_route(request, 1.3, "primary")),
        })
        .await
    }

    async fn legacy_directions(
        &self,
        request: &RouteRequest,
    ) -> Result<ProviderRoute, GeoGatewayError> {
        bump(&self.counters.legacy_directions);
        self.respond(|script| match &script.legacy_route_failure {
            Some(error) => Err(error.clone()),
            None => Ok(synthetic_route(request, 1.4, "legacy")),
        })
        .await
    }

    fn static_image_url(
        &self,
        coordinate: Coordinate,
        options: &StaticMapOptions,
    ) -> Result<Url, GeoGatewayError> {
        bump(&self.counters.static_image_url);
        if let Some(error) = &self.script().imagery_failure {
            return Err(error.clone());
        }
        Url::parse_with_params(
            "https://maps.test.invalid/static",
            &[
                ("center", coordinate.key()),
                ("zoom", options.zoom.to_string()),
                ("maptype", options.map_type.as_str().to_owned()),
            ],
        )
        .map_err(|err| GeoGatewayError::invalid_request(err.to_string()))
    }
}
