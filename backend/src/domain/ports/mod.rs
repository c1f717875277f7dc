//! Domain ports.
//!
//! Driven adapters under `crate::outbound` implement these traits; the
//! domain only ever holds them as `Arc<dyn Trait>`.

mod macros;
pub(crate) use macros::define_port_error;

mod bundle_repository;
mod cache_key;
mod cache_store;
mod city_store;
mod geo_gateway;

#[cfg(test)]
pub use bundle_repository::MockAnalysisBundleRepository;
pub use bundle_repository::{
    AnalysisBundleRepository, AnalysisBundleRepositoryError, FixtureAnalysisBundleRepository,
};
pub use cache_key::{CacheKey, CacheKeyBuilder, CacheKeyValidationError, KEY_NAMESPACE};
#[cfg(test)]
pub use cache_store::MockCacheStore;
pub use cache_store::{CacheCategory, CacheEntry, CacheStore, CacheStoreError, FixtureCacheStore};
#[cfg(test)]
pub use city_store::MockCityStore;
pub use city_store::{CitiesWithinRequest, CityDistance, CityRecord, CityStore, CityStoreError};
#[cfg(test)]
pub use geo_gateway::MockGeoGateway;
pub use geo_gateway::{
    AddressComponent, FixtureGeoGateway, GeoGateway, GeoGatewayError, MapType, PlaceSearchRequest,
    ProviderPlace, ProviderRoute, ReverseGeocodeResult, RouteRequest, StaticMapOptions,
};
