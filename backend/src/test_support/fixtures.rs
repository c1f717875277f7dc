//! Sample data centred on Colombo.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::Coordinate;
use crate::domain::ports::{AddressComponent, ProviderPlace, ReverseGeocodeResult};

/// Build a coordinate, panicking on invalid test input.
pub fn coordinate(latitude: f64, longitude: f64) -> Coordinate {
    match Coordinate::new(latitude, longitude) {
        Ok(coordinate) => coordinate,
        Err(error) => panic!("invalid fixture coordinate: {error}"),
    }
}

/// Colombo city centre.
pub fn colombo() -> Coordinate {
    coordinate(6.9271, 79.8612)
}

/// A fixed, readable instant.
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

fn component(name: &str, kinds: &[&str]) -> AddressComponent {
    AddressComponent {
        long_name: name.to_owned(),
        short_name: name.to_owned(),
        kinds: kinds.iter().map(|kind| (*kind).to_owned()).collect(),
    }
}

/// Reverse-geocode answer for central Colombo.
pub fn colombo_reverse_geocode() -> ReverseGeocodeResult {
    ReverseGeocodeResult {
        formatted_address: "Galle Face Centre Rd, Colombo 00300, Sri Lanka".to_owned(),
        place_id: Some("ChIJ-colombo-fort".to_owned()),
        components: vec![
            component("Galle Face Centre Road", &["route"]),
            component("Kollupitiya", &["sublocality_level_1", "sublocality", "political"]),
            component("Colombo", &["locality", "political"]),
            component("Thimbirigasyaya Divisional Secretariat", &["administrative_area_level_3", "political"]),
            component("Colombo District", &["administrative_area_level_2", "political"]),
            component("Western Province", &["administrative_area_level_1", "political"]),
            component("Sri Lanka", &["country", "political"]),
        ],
    }
}

fn place(id: Option<&str>, name: &str, tags: &[&str], latitude: f64, longitude: f64) -> ProviderPlace {
    ProviderPlace {
        id: id.map(str::to_owned),
        name: name.to_owned(),
        type_tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
        coordinate: coordinate(latitude, longitude),
        rating: Some(4.2),
        address: Some("Colombo, Sri Lanka".to_owned()),
    }
}

/// Facilities around central Colombo.
///
/// One place is tagged both `school` and `hospital` so it is returned by two
/// group searches, and one unnamed duplicate differs only below key
/// precision.
pub fn colombo_places() -> Vec<ProviderPlace> {
    vec![
        place(Some("ChIJ-royal"), "Royal College", &["school", "secondary_school"], 6.9040, 79.8600),
        place(Some("ChIJ-visakha"), "Visakha Vidyalaya", &["school"], 6.8800, 79.8650),
        place(Some("ChIJ-ananda"), "Ananda College", &["secondary_school"], 6.9275, 79.8700),
        place(Some("ChIJ-nhsl"), "National Hospital of Sri Lanka", &["hospital"], 6.9180, 79.8675),
        place(Some("ChIJ-lrh"), "Lady Ridgeway Hospital", &["hospital"], 6.9160, 79.8770),
        place(
            Some("ChIJ-nursing"),
            "Colombo School of Nursing",
            &["school", "hospital"],
            6.9195,
            79.8660,
        ),
        place(None, "Kollupitiya Dispensary", &["pharmacy"], 6.9110, 79.8490),
        place(None, "Kollupitiya Dispensary", &["pharmacy"], 6.911_01, 79.849_04),
        place(Some("ChIJ-boc"), "Bank of Ceylon", &["bank", "atm"], 6.9335, 79.8450),
        place(Some("ChIJ-gangaramaya"), "Gangaramaya Temple", &["point_of_interest"], 6.9167, 79.8565),
        place(Some("ChIJ-fort-station"), "Colombo Fort Railway Station", &["train_station"], 6.9344, 79.8502),
        place(Some("ChIJ-viharamahadevi"), "Viharamahadevi Park", &["park"], 6.9130, 79.8630),
    ]
}
