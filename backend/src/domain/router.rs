//! Point-to-point directions with a three-tier fallback ladder.

use std::sync::Arc;

use geodesy::CardinalDirection;
use tracing::{debug, warn};

use super::Coordinate;
use super::cache_access::AnalysisCache;
use super::fallback::FallbackLadder;
use super::ports::{CacheCategory, CacheKey, GeoGateway, GeoGatewayError, ProviderRoute, RouteRequest};
use super::resolution::{Resolved, UpstreamCalls};
use super::route::{DirectionResult, RouteStep, RouteTier, TravelMode};

/// Resolves directions via primary routing, then legacy directions, then a
/// local estimate.
pub struct Router {
    gateway: Arc<dyn GeoGateway>,
    cache: AnalysisCache,
}

impl Router {
    pub fn new(gateway: Arc<dyn GeoGateway>, cache: AnalysisCache) -> Self {
        Self { gateway, cache }
    }

    /// Directions from `origin` to `destination`; never fails.
    ///
    /// Provider results are cached; estimates are not, so a recovered
    /// provider is used on the next request.
    pub async fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Resolved<DirectionResult> {
        let key = CacheKey::builder(CacheCategory::Routes, origin)
            .param("destination", destination.key())
            .param("mode", mode)
            .build();
        if let Some(result) = self.cache.fetch(&key, CacheCategory::Routes).await {
            return Resolved::cached(result);
        }

        let request = RouteRequest {
            origin,
            destination,
            mode,
        };
        let outcome = FallbackLadder::<RouteTier, ProviderRoute, GeoGatewayError>::new()
            .then(RouteTier::Primary, || self.gateway.compute_route(&request))
            .then(RouteTier::Legacy, || self.gateway.legacy_directions(&request))
            .first_success(RouteTier::Estimated, || estimate_route(&request))
            .await;

        for (tier, error) in &outcome.failures {
            warn!(tier = tier.as_str(), origin = %origin.key(), destination = %destination.key(), %error, "routing tier failed");
        }
        let provider_calls = outcome.failures.len() + usize::from(outcome.result.tier != RouteTier::Estimated);
        let calls = UpstreamCalls::routes(u32::try_from(provider_calls).unwrap_or(u32::MAX));
        let tier = outcome.result.tier;
        let result = direction_result(&request, tier, outcome.result.value);

        if tier == RouteTier::Estimated {
            let reasons: Vec<String> = outcome
                .failures
                .iter()
                .map(|(tier, error)| format!("{tier}: {error}"))
                .collect();
            return Resolved::fallback(result, calls, reasons.join("; "));
        }

        debug!(tier = tier.as_str(), origin = %origin.key(), "route resolved");
        self.cache.store(&key, CacheCategory::Routes, &result).await;
        Resolved::fresh(result, calls)
    }
}

fn direction_result(request: &RouteRequest, tier: RouteTier, route: ProviderRoute) -> DirectionResult {
    DirectionResult {
        origin_name: None,
        origin: request.origin,
        destination: request.destination,
        travel_mode: request.mode,
        distance_meters: route.distance_meters,
        duration_seconds: route.duration_seconds,
        heading: CardinalDirection::between(request.origin.to_point(), request.destination.to_point()),
        steps: route.steps,
        source_tier: tier,
    }
}

/// Great-circle estimate at the mode's average speed with one synthetic
/// step. Deterministic.
pub fn estimate_route(request: &RouteRequest) -> ProviderRoute {
    let distance_meters = request.origin.distance_meters(&request.destination);
    let metres_per_second = request.mode.average_speed_kmh() * 1_000.0 / 3_600.0;
    let duration_seconds = distance_meters / metres_per_second;
    let heading = CardinalDirection::between(request.origin.to_point(), request.destination.to_point());
    ProviderRoute {
        distance_meters,
        duration_seconds,
        steps: vec![RouteStep {
            instruction: format!(
                "Head {heading} for approximately {:.1} km",
                distance_meters / 1_000.0
            ),
            distance_meters,
            duration_seconds,
        }],
    }
}

#[cfg(test)]
mod tests {
    //! Tier ordering, accounting, and caching rules.

    use std::time::Duration;

    use mockall::predicate::always;

    use super::*;
    use crate::domain::BranchStatus;
    use crate::domain::ports::{FixtureCacheStore, MockCacheStore, MockGeoGateway};
    use crate::domain::strategy::CacheTtls;
    use rstest::rstest;

    fn kandy() -> Coordinate {
        Coordinate::new(7.2906, 80.6337).expect("valid")
    }

    fn colombo() -> Coordinate {
        Coordinate::new(6.9271, 79.8612).expect("valid")
    }

    fn cache_with(store: impl crate::domain::ports::CacheStore + 'static) -> AnalysisCache {
        AnalysisCache::new(Arc::new(store), CacheTtls::default(), Duration::from_secs(1))
    }

    fn provider_route() -> ProviderRoute {
        ProviderRoute {
            distance_meters: 115_000.0,
            duration_seconds: 10_800.0,
            steps: vec![RouteStep {
                instruction: "Take A1 towards Kandy".to_owned(),
                distance_meters: 115_000.0,
                duration_seconds: 10_800.0,
            }],
        }
    }

    #[tokio::test]
    async fn primary_success_skips_legacy() {
        let mut gateway = MockGeoGateway::new();
        gateway
            .expect_compute_route()
            .times(1)
            .returning(|_| Ok(provider_route()));
        gateway.expect_legacy_directions().never();
        let router = Router::new(Arc::new(gateway), cache_with(FixtureCacheStore));
        let resolved = router.directions(colombo(), kandy(), TravelMode::Drive).await;
        assert_eq!(resolved.value.source_tier, RouteTier::Primary);
        assert_eq!(resolved.status, BranchStatus::Fresh);
        assert_eq!(resolved.calls, UpstreamCalls::routes(1));
    }

    #[tokio::test]
    async fn legacy_used_when_primary_fails() {
        let mut gateway = MockGeoGateway::new();
        gateway
            .expect_compute_route()
            .returning(|_| Err(GeoGatewayError::timeout("5s")));
        gateway
            .expect_legacy_directions()
            .times(1)
            .returning(|_| Ok(provider_route()));
        let router = Router::new(Arc::new(gateway), cache_with(FixtureCacheStore));
        let resolved = router.directions(colombo(), kandy(), TravelMode::Drive).await;
        assert_eq!(resolved.value.source_tier, RouteTier::Legacy);
        assert_eq!(resolved.calls, UpstreamCalls::routes(2));
    }

    #[rstest]
    #[case(TravelMode::Drive)]
    #[case(TravelMode::Walk)]
    #[case(TravelMode::Transit)]
    #[case(TravelMode::Bicycle)]
    #[tokio::test]
    async fn double_failure_is_estimated_and_not_cached(#[case] mode: TravelMode) {
        let mut gateway = MockGeoGateway::new();
        gateway
            .expect_compute_route()
            .returning(|_| Err(GeoGatewayError::transport("reset")));
        gateway
            .expect_legacy_directions()
            .returning(|_| Err(GeoGatewayError::not_found("ZERO_RESULTS")));
        let mut store = MockCacheStore::new();
        store.expect_get().returning(|_, _| Ok(None));
        store.expect_set().never();
        let router = Router::new(Arc::new(gateway), cache_with(store));

        let resolved = router.directions(colombo(), kandy(), mode).await;

        assert_eq!(resolved.value.source_tier, RouteTier::Estimated);
        assert_eq!(resolved.status, BranchStatus::Fallback);
        assert_eq!(resolved.value.steps.len(), 1);
        assert!(resolved.value.distance_meters > 90_000.0);
        assert!(resolved.error.as_deref().is_some_and(|e| e.contains("primary")));
    }

    #[tokio::test]
    async fn provider_result_is_cached() {
        let mut gateway = MockGeoGateway::new();
        gateway
            .expect_compute_route()
            .returning(|_| Ok(provider_route()));
        let mut store = MockCacheStore::new();
        store.expect_get().returning(|_, _| Ok(None));
        store
            .expect_set()
            .with(always(), mockall::predicate::eq(CacheCategory::Routes), always(), always())
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let router = Router::new(Arc::new(gateway), cache_with(store));
        router.directions(colombo(), kandy(), TravelMode::Walk).await;
    }

    #[test]
    fn estimate_uses_mode_speed() {
        let request = RouteRequest {
            origin: Coordinate::new(0.0, 0.0).expect("valid"),
            destination: Coordinate::new(0.0, 0.449_66).expect("valid"),
            mode: TravelMode::Drive,
        };
        let route = estimate_route(&request);
        // ~50 km at 50 km/h is about an hour.
        assert!((route.duration_seconds - 3_600.0).abs() < 10.0, "{}", route.duration_seconds);
        assert!(route.steps[0].instruction.starts_with("Head east"));
    }
}
