//! Driven port for the geospatial provider.
//!
//! One seam covers reverse geocoding, nearby search, both routing tiers, and
//! static imagery URLs so the real provider can be swapped for a
//! deterministic double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::define_port_error;
use crate::domain::{Coordinate, RouteStep, TravelMode};

/// One component of a reverse-geocoded address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    /// Provider component types, e.g. `administrative_area_level_1`.
    pub kinds: Vec<String>,
}

impl AddressComponent {
    /// Whether the component carries `kind`.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.iter().any(|candidate| candidate == kind)
    }
}

/// Best reverse-geocoding match for a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseGeocodeResult {
    pub formatted_address: String,
    pub place_id: Option<String>,
    pub components: Vec<AddressComponent>,
}

/// Nearby search for places carrying any of `type_tags`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceSearchRequest {
    pub center: Coordinate,
    pub radius_m: u32,
    pub type_tags: Vec<String>,
    pub max_results: u8,
}

/// Place as reported by the provider, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPlace {
    pub id: Option<String>,
    pub name: String,
    pub type_tags: Vec<String>,
    pub coordinate: Coordinate,
    pub rating: Option<f32>,
    pub address: Option<String>,
}

/// Point-to-point route query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub mode: TravelMode,
}

/// Route as reported by either routing tier.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub steps: Vec<RouteStep>,
}

/// Map rendering style for static imagery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    Roadmap,
    Satellite,
    Hybrid,
    Terrain,
}

impl MapType {
    /// Provider identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Roadmap => "roadmap",
            Self::Satellite => "satellite",
            Self::Hybrid => "hybrid",
            Self::Terrain => "terrain",
        }
    }
}

/// Rendering options for a static map image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaticMapOptions {
    pub map_type: MapType,
    pub zoom: u8,
    pub width: u16,
    pub height: u16,
    pub marker: bool,
}

define_port_error! {
    /// Errors surfaced while calling the geospatial provider.
    pub enum GeoGatewayError {
        /// Network transport failed before a usable response arrived.
        Transport { message: String } =>
            "geo provider transport failed: {message}",
        /// The call exceeded its time budget.
        Timeout { message: String } =>
            "geo provider timeout: {message}",
        /// The provider throttled the request.
        RateLimited { message: String } =>
            "geo provider rate limited request: {message}",
        /// The response could not be decoded.
        Decode { message: String } =>
            "geo provider response decode failed: {message}",
        /// The request was rejected as malformed or unauthorised.
        InvalidRequest { message: String } =>
            "geo provider request invalid: {message}",
        /// The call succeeded but found nothing.
        NotFound { message: String } =>
            "geo provider found no results: {message}",
        /// The adapter refused to issue the call.
        Rejected { message: String } =>
            "geo provider call rejected: {message}",
    }
}

impl GeoGatewayError {
    /// Return whether retrying this error is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Zero results from an otherwise successful call.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Port for the geospatial provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoGateway: Send + Sync {
    /// Best address match for `coordinate`.
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, GeoGatewayError>;

    /// Places within the request circle carrying any requested type.
    async fn search_places(
        &self,
        request: &PlaceSearchRequest,
    ) -> Result<Vec<ProviderPlace>, GeoGatewayError>;

    /// Traffic-aware route.
    async fn compute_route(&self, request: &RouteRequest) -> Result<ProviderRoute, GeoGatewayError>;

    /// Route from the older directions endpoint.
    async fn legacy_directions(
        &self,
        request: &RouteRequest,
    ) -> Result<ProviderRoute, GeoGatewayError>;

    /// Static map URL centred on `coordinate`. Performs no network I/O.
    fn static_image_url(
        &self,
        coordinate: Coordinate,
        options: &StaticMapOptions,
    ) -> Result<Url, GeoGatewayError>;
}

const FIXTURE_IMAGE_BASE: &str = "https://maps.example.invalid/static";

/// Offline gateway used when no provider credentials are configured.
///
/// Geocoding returns a synthetic address, searches return nothing, routing
/// always reports no result, and imagery URLs point at a reserved host.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureGeoGateway;

#[async_trait]
impl GeoGateway for FixtureGeoGateway {
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, GeoGatewayError> {
        Ok(ReverseGeocodeResult {
            formatted_address: format!("Unmapped site near {}", coordinate.key()),
            place_id: None,
            components: vec![AddressComponent {
                long_name: "Sri Lanka".to_owned(),
                short_name: "LK".to_owned(),
                kinds: vec!["country".to_owned(), "political".to_owned()],
            }],
        })
    }

    async fn search_places(
        &self,
        _request: &PlaceSearchRequest,
    ) -> Result<Vec<ProviderPlace>, GeoGatewayError> {
        Ok(Vec::new())
    }

    async fn compute_route(&self, _request: &RouteRequest) -> Result<ProviderRoute, GeoGatewayError> {
        Err(GeoGatewayError::not_found("fixture gateway has no routing data"))
    }

    async fn legacy_directions(
        &self,
        _request: &RouteRequest,
    ) -> Result<ProviderRoute, GeoGatewayError> {
        Err(GeoGatewayError::not_found("fixture gateway has no routing data"))
    }

    fn static_image_url(
        &self,
        coordinate: Coordinate,
        options: &StaticMapOptions,
    ) -> Result<Url, GeoGatewayError> {
        Url::parse_with_params(
            FIXTURE_IMAGE_BASE,
            &[
                ("center", coordinate.key()),
                ("zoom", options.zoom.to_string()),
                ("maptype", options.map_type.as_str().to_owned()),
            ],
        )
        .map_err(|err| GeoGatewayError::invalid_request(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    //! Error classification and fixture behaviour.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GeoGatewayError::transport("reset"), true)]
    #[case(GeoGatewayError::timeout("5s"), true)]
    #[case(GeoGatewayError::rate_limited("429"), true)]
    #[case(GeoGatewayError::decode("bad json"), false)]
    #[case(GeoGatewayError::invalid_request("denied"), false)]
    #[case(GeoGatewayError::not_found("zero"), false)]
    #[case(GeoGatewayError::rejected("closed"), false)]
    fn classifies_retryable_errors(#[case] err: GeoGatewayError, #[case] retryable: bool) {
        assert_eq!(err.is_retryable(), retryable);
    }

    #[tokio::test]
    async fn fixture_gateway_never_routes() {
        let here = Coordinate::new(6.9271, 79.8612).expect("valid");
        let request = RouteRequest {
            origin: here,
            destination: here,
            mode: TravelMode::Walk,
        };
        let err = FixtureGeoGateway
            .compute_route(&request)
            .await
            .expect_err("fixture has no routes");
        assert!(err.is_not_found());
    }

    #[test]
    fn fixture_image_url_carries_center() {
        let here = Coordinate::new(6.9271, 79.8612).expect("valid");
        let options = StaticMapOptions {
            map_type: MapType::Satellite,
            zoom: 17,
            width: 640,
            height: 640,
            marker: true,
        };
        let url = FixtureGeoGateway
            .static_image_url(here, &options)
            .expect("url builds");
        assert!(url.as_str().contains("center=6.9271%2C79.8612"));
    }
}
