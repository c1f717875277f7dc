//! Admission control for provider calls.
//!
//! Every gateway call made by the resolvers passes through
//! [`GuardedGeoGateway`]: a shared semaphore bounds how many calls are in
//! flight across all requests, and each call is cut off after the
//! configured timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::warn;
use url::Url;

use super::Coordinate;
use super::ports::{
    GeoGateway, GeoGatewayError, PlaceSearchRequest, ProviderPlace, ProviderRoute,
    ReverseGeocodeResult, RouteRequest, StaticMapOptions,
};

/// Gateway decorator enforcing a concurrency limit and per-call timeout.
pub struct GuardedGeoGateway {
    inner: Arc<dyn GeoGateway>,
    call_semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl GuardedGeoGateway {
    /// Wrap `inner`, allowing at most `max_concurrent_calls` (minimum one)
    /// calls at a time.
    pub fn new(inner: Arc<dyn GeoGateway>, max_concurrent_calls: usize, timeout: Duration) -> Self {
        Self {
            inner,
            call_semaphore: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            timeout,
        }
    }

    async fn admit<T, F>(&self, operation: &'static str, call: F) -> Result<T, GeoGatewayError>
    where
        F: Future<Output = Result<T, GeoGatewayError>> + Send,
    {
        let _permit = self
            .call_semaphore
            .acquire()
            .await
            .map_err(|_| GeoGatewayError::rejected("upstream call semaphore closed"))?;
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout.as_millis(), "upstream call timed out");
                Err(GeoGatewayError::timeout(format!(
                    "{operation} exceeded {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl GeoGateway for GuardedGeoGateway {
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, GeoGatewayError> {
        self.admit("reverse_geocode", self.inner.reverse_geocode(coordinate))
            .await
    }

    async fn search_places(
        &self,
        request: &PlaceSearchRequest,
    ) -> Result<Vec<ProviderPlace>, GeoGatewayError> {
        self.admit("search_places", self.inner.search_places(request))
            .await
    }

    async fn compute_route(&self, request: &RouteRequest) -> Result<ProviderRoute, GeoGatewayError> {
        self.admit("compute_route", self.inner.compute_route(request))
            .await
    }

    async fn legacy_directions(
        &self,
        request: &RouteRequest,
    ) -> Result<ProviderRoute, GeoGatewayError> {
        self.admit("legacy_directions", self.inner.legacy_directions(request))
            .await
    }

    fn static_image_url(
        &self,
        coordinate: Coordinate,
        options: &StaticMapOptions,
    ) -> Result<Url, GeoGatewayError> {
        self.inner.static_image_url(coordinate, options)
    }
}
