//! Wire shapes for the Google Maps Platform endpoints.
//!
//! Responses decode into these DTOs first and are mapped into port types in
//! one pass. Request bodies for the JSON APIs live here too.

use serde::{Deserialize, Serialize};

use crate::domain::ports::{AddressComponent, ProviderPlace, ProviderRoute, ReverseGeocodeResult};
use crate::domain::{Coordinate, RouteStep};

/// Envelope status shared by the Geocoding and legacy Directions APIs.
#[derive(Debug, Deserialize)]
pub(super) struct LegacyStatusDto {
    pub(super) status: String,
    #[serde(default)]
    pub(super) error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GeocodeResponseDto {
    #[serde(flatten)]
    pub(super) envelope: LegacyStatusDto,
    #[serde(default)]
    results: Vec<GeocodeResultDto>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResultDto {
    formatted_address: String,
    place_id: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponentDto>,
}

#[derive(Debug, Deserialize)]
struct AddressComponentDto {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeResponseDto {
    /// Best match, or `None` when the provider returned no results.
    pub(super) fn into_best_match(self) -> Option<ReverseGeocodeResult> {
        let best = self.results.into_iter().next()?;
        Some(ReverseGeocodeResult {
            formatted_address: best.formatted_address,
            place_id: best.place_id,
            components: best
                .address_components
                .into_iter()
                .map(|component| AddressComponent {
                    long_name: component.long_name,
                    short_name: component.short_name,
                    kinds: component.types,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(super) struct LatLngDto {
    pub(super) latitude: f64,
    pub(super) longitude: f64,
}

impl From<Coordinate> for LatLngDto {
    fn from(value: Coordinate) -> Self {
        Self {
            latitude: value.latitude(),
            longitude: value.longitude(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchNearbyRequestDto {
    pub(super) included_types: Vec<String>,
    pub(super) max_result_count: u8,
    pub(super) location_restriction: LocationRestrictionDto,
}

#[derive(Debug, Serialize)]
pub(super) struct LocationRestrictionDto {
    pub(super) circle: CircleDto,
}

#[derive(Debug, Serialize)]
pub(super) struct CircleDto {
    pub(super) center: LatLngDto,
    pub(super) radius: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchNearbyResponseDto {
    #[serde(default)]
    places: Vec<PlaceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceDto {
    id: Option<String>,
    display_name: Option<LocalizedTextDto>,
    #[serde(default)]
    types: Vec<String>,
    location: Option<LocationDto>,
    rating: Option<f32>,
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizedTextDto {
    text: String,
}

#[derive(Debug, Deserialize)]
struct LocationDto {
    latitude: f64,
    longitude: f64,
}

impl SearchNearbyResponseDto {
    /// Places with a name and valid location; others are skipped.
    pub(super) fn into_places(self) -> Vec<ProviderPlace> {
        self.places
            .into_iter()
            .filter_map(|place| {
                let name = place.display_name?.text;
                let location = place.location?;
                let coordinate = Coordinate::new(location.latitude, location.longitude).ok()?;
                Some(ProviderPlace {
                    id: place.id,
                    name,
                    type_tags: place.types,
                    coordinate,
                    rating: place.rating,
                    address: place.formatted_address,
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ComputeRoutesRequestDto {
    pub(super) origin: WaypointDto,
    pub(super) destination: WaypointDto,
    pub(super) travel_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) routing_preference: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub(super) struct WaypointDto {
    pub(super) location: WaypointLocationDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WaypointLocationDto {
    pub(super) lat_lng: LatLngDto,
}

impl From<Coordinate> for WaypointDto {
    fn from(value: Coordinate) -> Self {
        Self {
            location: WaypointLocationDto {
                lat_lng: value.into(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ComputeRoutesResponseDto {
    #[serde(default)]
    routes: Vec<ComputedRouteDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputedRouteDto {
    #[serde(default)]
    distance_meters: f64,
    duration: Option<String>,
    #[serde(default)]
    legs: Vec<ComputedLegDto>,
}

#[derive(Debug, Deserialize)]
struct ComputedLegDto {
    #[serde(default)]
    steps: Vec<ComputedStepDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputedStepDto {
    #[serde(default)]
    distance_meters: f64,
    static_duration: Option<String>,
    navigation_instruction: Option<NavigationInstructionDto>,
}

#[derive(Debug, Deserialize)]
struct NavigationInstructionDto {
    #[serde(default)]
    instructions: String,
}

/// Parse a protobuf duration such as `"1234s"` or `"12.5s"`.
pub(super) fn parse_duration_seconds(raw: &str) -> Result<f64, String> {
    raw.strip_suffix('s')
        .and_then(|seconds| seconds.parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .ok_or_else(|| format!("invalid duration {raw:?}"))
}

impl ComputeRoutesResponseDto {
    /// First route, `Ok(None)` when the provider found none.
    pub(super) fn into_first_route(self) -> Result<Option<ProviderRoute>, String> {
        let Some(route) = self.routes.into_iter().next() else {
            return Ok(None);
        };
        let duration_seconds = route
            .duration
            .as_deref()
            .map(parse_duration_seconds)
            .transpose()?
            .unwrap_or_default();
        let steps = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|step| {
                Ok(RouteStep {
                    instruction: step
                        .navigation_instruction
                        .map(|instruction| instruction.instructions)
                        .unwrap_or_default(),
                    distance_meters: step.distance_meters,
                    duration_seconds: step
                        .static_duration
                        .as_deref()
                        .map(parse_duration_seconds)
                        .transpose()?
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Some(ProviderRoute {
            distance_meters: route.distance_meters,
            duration_seconds,
            steps,
        }))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct DirectionsResponseDto {
    #[serde(flatten)]
    pub(super) envelope: LegacyStatusDto,
    #[serde(default)]
    routes: Vec<DirectionsRouteDto>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRouteDto {
    #[serde(default)]
    legs: Vec<DirectionsLegDto>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLegDto {
    distance: ValueDto,
    duration: ValueDto,
    #[serde(default)]
    steps: Vec<DirectionsStepDto>,
}

#[derive(Debug, Deserialize)]
struct DirectionsStepDto {
    #[serde(default)]
    html_instructions: String,
    distance: ValueDto,
    duration: ValueDto,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ValueDto {
    value: f64,
}

impl DirectionsResponseDto {
    /// Sum the legs of the first route.
    pub(super) fn into_first_route(self) -> Option<ProviderRoute> {
        let route = self.routes.into_iter().next()?;
        if route.legs.is_empty() {
            return None;
        }
        let distance_meters = route.legs.iter().map(|leg| leg.distance.value).sum();
        let duration_seconds = route.legs.iter().map(|leg| leg.duration.value).sum();
        let steps = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|step| RouteStep {
                instruction: strip_markup(&step.html_instructions),
                distance_meters: step.distance.value,
                duration_seconds: step.duration.value,
            })
            .collect();
        Some(ProviderRoute {
            distance_meters,
            duration_seconds,
            steps,
        })
    }
}

/// Drop HTML tags from a legacy instruction.
fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1234s", 1234.0)]
    #[case("12.5s", 12.5)]
    #[case("0s", 0.0)]
    fn parses_protobuf_durations(#[case] raw: &str, #[case] expected: f64) {
        let seconds = parse_duration_seconds(raw).expect("valid duration");
        assert!((seconds - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case("1234")]
    #[case("-3s")]
    #[case("abc s")]
    fn rejects_malformed_durations(#[case] raw: &str) {
        assert!(parse_duration_seconds(raw).is_err());
    }

    #[test]
    fn strips_instruction_markup() {
        assert_eq!(
            strip_markup("Turn <b>left</b> onto <b>Galle Rd</b><div>Pass the bank</div>"),
            "Turn left onto Galle Rd Pass the bank"
        );
    }

    #[test]
    fn skips_places_without_location() {
        let body = r#"{"places": [
            {"id": "a", "displayName": {"text": "Royal College"}, "types": ["school"],
             "location": {"latitude": 6.904, "longitude": 79.86}},
            {"id": "b", "displayName": {"text": "Nowhere"}, "types": ["school"]}
        ]}"#;
        let decoded: SearchNearbyResponseDto = serde_json::from_str(body).expect("decodes");
        let places = decoded.into_places();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, "Royal College");
    }
}
