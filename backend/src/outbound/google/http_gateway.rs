//! Reqwest-backed Google Maps Platform gateway.
//!
//! This adapter owns transport details only: request shaping, HTTP and body
//! status mapping, and decoding into port types.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::dto::{
    CircleDto, ComputeRoutesRequestDto, ComputeRoutesResponseDto, DirectionsResponseDto,
    GeocodeResponseDto, LegacyStatusDto, LocationRestrictionDto, SearchNearbyRequestDto,
    SearchNearbyResponseDto,
};
use crate::domain::ports::{
    GeoGateway, GeoGatewayError, PlaceSearchRequest, ProviderPlace, ProviderRoute,
    ReverseGeocodeResult, RouteRequest, StaticMapOptions,
};
use crate::domain::{Coordinate, TravelMode};

const API_KEY_HEADER: &str = "X-Goog-Api-Key";
const FIELD_MASK_HEADER: &str = "X-Goog-FieldMask";
const PLACES_FIELD_MASK: &str = "places.id,places.displayName,places.types,places.location,places.rating,places.formattedAddress";
const ROUTES_FIELD_MASK: &str = "routes.distanceMeters,routes.duration,routes.legs.steps.distanceMeters,routes.legs.steps.staticDuration,routes.legs.steps.navigationInstruction";

/// Endpoint URLs, overridable for tests and proxies.
#[derive(Debug, Clone)]
pub struct GoogleMapsEndpoints {
    pub geocode: Url,
    pub search_nearby: Url,
    pub compute_routes: Url,
    pub directions: Url,
    pub static_map: Url,
}

impl GoogleMapsEndpoints {
    /// Public Google Maps Platform endpoints.
    pub fn production() -> Result<Self, url::ParseError> {
        Ok(Self {
            geocode: Url::parse("https://maps.googleapis.com/maps/api/geocode/json")?,
            search_nearby: Url::parse("https://places.googleapis.com/v1/places:searchNearby")?,
            compute_routes: Url::parse(
                "https://routes.googleapis.com/directions/v2:computeRoutes",
            )?,
            directions: Url::parse("https://maps.googleapis.com/maps/api/directions/json")?,
            static_map: Url::parse("https://maps.googleapis.com/maps/api/staticmap")?,
        })
    }
}

/// Gateway over the Geocoding, Places (New), Routes, Directions, and Static
/// Maps APIs.
pub struct GoogleMapsGateway {
    client: Client,
    api_key: String,
    endpoints: GoogleMapsEndpoints,
}

impl GoogleMapsGateway {
    /// Build a gateway against the production endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`GeoGatewayError::InvalidRequest`] when the key is blank or
    /// the HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, GeoGatewayError> {
        let endpoints = GoogleMapsEndpoints::production()
            .map_err(|err| GeoGatewayError::invalid_request(err.to_string()))?;
        Self::with_endpoints(api_key, timeout, endpoints)
    }

    /// Build a gateway against explicit endpoints.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_endpoints(
        api_key: impl Into<String>,
        timeout: Duration,
        endpoints: GoogleMapsEndpoints,
    ) -> Result<Self, GeoGatewayError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeoGatewayError::invalid_request("api key must not be blank"));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GeoGatewayError::invalid_request(err.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoints,
        })
    }

    /// Append the API key to a stored static-map URL at the point of
    /// fetching it. Stored URLs never carry the key.
    pub fn authorise_static_url(&self, url: &Url) -> Url {
        let mut authorised = url.clone();
        authorised.query_pairs_mut().append_pair("key", &self.api_key);
        authorised
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GeoGatewayError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        serde_json::from_slice(body.as_ref()).map_err(|err| {
            GeoGatewayError::decode(format!("invalid provider JSON payload: {err}"))
        })
    }
}

fn lat_lng(coordinate: Coordinate) -> String {
    format!("{},{}", coordinate.latitude(), coordinate.longitude())
}

const fn routes_travel_mode(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Drive => "DRIVE",
        TravelMode::Walk => "WALK",
        TravelMode::Transit => "TRANSIT",
        TravelMode::Bicycle => "BICYCLE",
    }
}

const fn directions_travel_mode(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Drive => "driving",
        TravelMode::Walk => "walking",
        TravelMode::Transit => "transit",
        TravelMode::Bicycle => "bicycling",
    }
}

#[async_trait]
impl GeoGateway for GoogleMapsGateway {
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, GeoGatewayError> {
        let request = self.client.get(self.endpoints.geocode.clone()).query(&[
            ("latlng", lat_lng(coordinate)),
            ("key", self.api_key.clone()),
        ]);
        let decoded: GeocodeResponseDto = self.send(request).await?;
        check_legacy_status(&decoded.envelope)?;
        decoded
            .into_best_match()
            .ok_or_else(|| GeoGatewayError::not_found("geocoder returned no results"))
    }

    async fn search_places(
        &self,
        request: &PlaceSearchRequest,
    ) -> Result<Vec<ProviderPlace>, GeoGatewayError> {
        if request.type_tags.is_empty() {
            return Err(GeoGatewayError::invalid_request("nearby search needs at least one type"));
        }
        let body = SearchNearbyRequestDto {
            included_types: request.type_tags.clone(),
            max_result_count: request.max_results,
            location_restriction: LocationRestrictionDto {
                circle: CircleDto {
                    center: request.center.into(),
                    radius: f64::from(request.radius_m),
                },
            },
        };
        let http = self
            .client
            .post(self.endpoints.search_nearby.clone())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header(FIELD_MASK_HEADER, PLACES_FIELD_MASK)
            .json(&body);
        let decoded: SearchNearbyResponseDto = self.send(http).await?;
        Ok(decoded.into_places())
    }

    async fn compute_route(&self, request: &RouteRequest) -> Result<ProviderRoute, GeoGatewayError> {
        let body = ComputeRoutesRequestDto {
            origin: request.origin.into(),
            destination: request.destination.into(),
            travel_mode: routes_travel_mode(request.mode),
            routing_preference: matches!(request.mode, TravelMode::Drive).then_some("TRAFFIC_AWARE"),
        };
        let http = self
            .client
            .post(self.endpoints.compute_routes.clone())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header(FIELD_MASK_HEADER, ROUTES_FIELD_MASK)
            .json(&body);
        let decoded: ComputeRoutesResponseDto = self.send(http).await?;
        decoded
            .into_first_route()
            .map_err(GeoGatewayError::decode)?
            .ok_or_else(|| GeoGatewayError::not_found("routes API returned no routes"))
    }

    async fn legacy_directions(
        &self,
        request: &RouteRequest,
    ) -> Result<ProviderRoute, GeoGatewayError> {
        let http = self.client.get(self.endpoints.directions.clone()).query(&[
            ("origin", lat_lng(request.origin)),
            ("destination", lat_lng(request.destination)),
            ("mode", directions_travel_mode(request.mode).to_owned()),
            ("key", self.api_key.clone()),
        ]);
        let decoded: DirectionsResponseDto = self.send(http).await?;
        check_legacy_status(&decoded.envelope)?;
        decoded
            .into_first_route()
            .ok_or_else(|| GeoGatewayError::not_found("directions API returned no routes"))
    }

    fn static_image_url(
        &self,
        coordinate: Coordinate,
        options: &StaticMapOptions,
    ) -> Result<Url, GeoGatewayError> {
        if options.width == 0 || options.height == 0 {
            return Err(GeoGatewayError::invalid_request("image size must be positive"));
        }
        let mut url = self.endpoints.static_map.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("center", &lat_lng(coordinate))
                .append_pair("zoom", &options.zoom.to_string())
                .append_pair("size", &format!("{}x{}", options.width, options.height))
                .append_pair("maptype", options.map_type.as_str());
            if options.marker {
                query.append_pair("markers", &format!("color:red|{}", lat_lng(coordinate)));
            }
        }
        Ok(url)
    }
}

/// Map the `status` field of the Geocoding and Directions envelopes.
fn check_legacy_status(envelope: &LegacyStatusDto) -> Result<(), GeoGatewayError> {
    let message = envelope
        .error_message
        .as_deref()
        .map_or_else(|| envelope.status.clone(), |detail| format!("{}: {detail}", envelope.status));
    match envelope.status.as_str() {
        "OK" => Ok(()),
        "ZERO_RESULTS" | "NOT_FOUND" => Err(GeoGatewayError::not_found(message)),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(GeoGatewayError::rate_limited(message)),
        "REQUEST_DENIED" | "INVALID_REQUEST" | "MAX_WAYPOINTS_EXCEEDED" | "MAX_ROUTE_LENGTH_EXCEEDED" => {
            Err(GeoGatewayError::invalid_request(message))
        }
        _ => Err(GeoGatewayError::transport(message)),
    }
}

fn map_transport_error(error: reqwest::Error) -> GeoGatewayError {
    if error.is_timeout() {
        GeoGatewayError::timeout(error.to_string())
    } else {
        GeoGatewayError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GeoGatewayError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {preview}", status.as_u16())
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => GeoGatewayError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GeoGatewayError::timeout(message),
        _ if status.is_client_error() => GeoGatewayError::invalid_request(message),
        _ => GeoGatewayError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Non-network mapping helpers.

    use super::*;
    use crate::domain::ports::MapType;
    use crate::test_support::colombo;
    use rstest::rstest;

    fn gateway() -> GoogleMapsGateway {
        GoogleMapsGateway::new("test-key", Duration::from_secs(1)).expect("gateway builds")
    }

    #[rstest]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, "rate_limited")]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, "timeout")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "timeout")]
    #[case::forbidden(StatusCode::FORBIDDEN, "invalid_request")]
    #[case::server_error(StatusCode::BAD_GATEWAY, "transport")]
    fn maps_http_statuses(#[case] status: StatusCode, #[case] expected: &str) {
        let error = map_status_error(status, br#"{"error": {"message": "quota"}}"#);
        let kind = match error {
            GeoGatewayError::RateLimited { .. } => "rate_limited",
            GeoGatewayError::Timeout { .. } => "timeout",
            GeoGatewayError::InvalidRequest { .. } => "invalid_request",
            GeoGatewayError::Transport { .. } => "transport",
            other => panic!("unexpected mapping: {other}"),
        };
        assert_eq!(kind, expected);
    }

    #[rstest]
    #[case("OK", None)]
    #[case("ZERO_RESULTS", Some("not_found"))]
    #[case("OVER_QUERY_LIMIT", Some("rate_limited"))]
    #[case("REQUEST_DENIED", Some("invalid_request"))]
    #[case("INVALID_REQUEST", Some("invalid_request"))]
    #[case("UNKNOWN_ERROR", Some("transport"))]
    fn maps_body_statuses(#[case] status: &str, #[case] expected: Option<&str>) {
        let envelope = LegacyStatusDto {
            status: status.to_owned(),
            error_message: None,
        };
        let kind = check_legacy_status(&envelope).err().map(|error| match error {
            GeoGatewayError::NotFound { .. } => "not_found",
            GeoGatewayError::RateLimited { .. } => "rate_limited",
            GeoGatewayError::InvalidRequest { .. } => "invalid_request",
            GeoGatewayError::Transport { .. } => "transport",
            other => panic!("unexpected mapping: {other}"),
        });
        assert_eq!(kind, expected);
    }

    #[test]
    fn body_preview_is_compacted_and_truncated() {
        let long = format!("  error \n {}", "x".repeat(400));
        let preview = body_preview(long.as_bytes());
        assert!(preview.starts_with("error x"));
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 163);
    }

    #[test]
    fn static_map_url_carries_view_options() {
        let options = StaticMapOptions {
            map_type: MapType::Satellite,
            zoom: 18,
            width: 640,
            height: 480,
            marker: true,
        };
        let url = gateway()
            .static_image_url(colombo(), &options)
            .expect("url builds");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let value = |name: &str| {
            query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(url.host_str(), Some("maps.googleapis.com"));
        assert_eq!(value("center"), Some("6.9271,79.8612"));
        assert_eq!(value("size"), Some("640x480"));
        assert_eq!(value("maptype"), Some("satellite"));
        assert_eq!(value("markers"), Some("color:red|6.9271,79.8612"));
        assert_eq!(value("key"), None);
    }

    #[test]
    fn stored_static_map_urls_omit_the_key_until_authorised() {
        let gateway = gateway();
        let url = gateway
            .static_image_url(
                colombo(),
                &StaticMapOptions {
                    map_type: MapType::Roadmap,
                    zoom: 15,
                    width: 400,
                    height: 300,
                    marker: false,
                },
            )
            .expect("url builds");
        assert!(!url.as_str().contains("test-key"));

        let authorised = gateway.authorise_static_url(&url);
        assert!(authorised.query_pairs().any(|(key, value)| key == "key" && value == "test-key"));
        assert!(authorised.as_str().starts_with(url.as_str()));
    }

    #[test]
    fn blank_api_keys_are_rejected() {
        assert!(GoogleMapsGateway::new("  ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn legacy_directions_sum_route_legs() {
        let body = r#"{
            "status": "OK",
            "routes": [{"legs": [
                {"distance": {"value": 1000}, "duration": {"value": 120},
                 "steps": [{"html_instructions": "Head <b>north</b>",
                            "distance": {"value": 1000}, "duration": {"value": 120}}]},
                {"distance": {"value": 500}, "duration": {"value": 60}, "steps": []}
            ]}]
        }"#;
        let decoded: DirectionsResponseDto = serde_json::from_str(body).expect("decodes");
        check_legacy_status(&decoded.envelope).expect("status ok");
        let route = decoded.into_first_route().expect("route present");
        assert!((route.distance_meters - 1_500.0).abs() < f64::EPSILON);
        assert!((route.duration_seconds - 180.0).abs() < f64::EPSILON);
        assert_eq!(route.steps[0].instruction, "Head north");
    }

    #[test]
    fn empty_compute_routes_response_has_no_route() {
        let decoded: ComputeRoutesResponseDto = serde_json::from_str("{}").expect("decodes");
        assert_eq!(decoded.into_first_route(), Ok(None));
    }
}
