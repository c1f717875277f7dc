//! Reverse-geocoded street address for a site.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Coordinate;
use super::cache_access::AnalysisCache;
use super::ports::{AddressComponent, CacheCategory, CacheKey, GeoGateway, ReverseGeocodeResult};
use super::resolution::{Resolved, UpstreamCalls};

/// Postal address of a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub formatted_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub components: Vec<AddressComponent>,
    /// Set when the address is a locally generated stand-in.
    pub is_stub: bool,
}

impl Address {
    /// Structurally valid stand-in used when geocoding fails.
    pub fn stub(coordinate: Coordinate) -> Self {
        Self {
            formatted_address: format!("Location at {}", coordinate.key()),
            place_id: None,
            components: Vec::new(),
            is_stub: true,
        }
    }

    /// First component carrying `kind`.
    pub fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.components.iter().find(|component| component.has_kind(kind))
    }
}

impl From<ReverseGeocodeResult> for Address {
    fn from(value: ReverseGeocodeResult) -> Self {
        Self {
            formatted_address: value.formatted_address,
            place_id: value.place_id,
            components: value.components,
            is_stub: false,
        }
    }
}

/// Resolves and caches addresses.
pub struct AddressResolver {
    gateway: Arc<dyn GeoGateway>,
    cache: AnalysisCache,
}

impl AddressResolver {
    pub fn new(gateway: Arc<dyn GeoGateway>, cache: AnalysisCache) -> Self {
        Self { gateway, cache }
    }

    /// Address for `coordinate`; never fails.
    pub async fn resolve(&self, coordinate: Coordinate) -> Resolved<Address> {
        let key = CacheKey::builder(CacheCategory::Geocoding, coordinate).build();
        if let Some(address) = self.cache.fetch(&key, CacheCategory::Geocoding).await {
            return Resolved::cached(address);
        }

        match self.gateway.reverse_geocode(coordinate.rounded()).await {
            Ok(result) => {
                let address = Address::from(result);
                self.cache.store(&key, CacheCategory::Geocoding, &address).await;
                Resolved::fresh(address, UpstreamCalls::geocode(1))
            }
            Err(error) => {
                warn!(coordinate = %coordinate.key(), %error, "reverse geocoding failed; using stub address");
                Resolved::fallback(Address::stub(coordinate), UpstreamCalls::geocode(1), error.to_string())
            }
        }
    }
}
