//! Internal Diesel row structs. Never exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Double, Nullable, Text};

use super::schema::{analysis_bundles, cities};

/// Row read from `cities`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = cities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CityRow {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub population: Option<i64>,
    pub is_major_city: bool,
    pub timezone: Option<String>,
}

/// Row returned by the spatial radius query.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct CityDistanceRow {
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub country: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub state: Option<String>,
    #[diesel(sql_type = Double)]
    pub latitude: f64,
    #[diesel(sql_type = Double)]
    pub longitude: f64,
    #[diesel(sql_type = Nullable<diesel::sql_types::BigInt>)]
    pub population: Option<i64>,
    #[diesel(sql_type = Bool)]
    pub is_major_city: bool,
    #[diesel(sql_type = Nullable<Text>)]
    pub timezone: Option<String>,
    #[diesel(sql_type = Double)]
    pub distance_km: f64,
}

impl CityDistanceRow {
    pub(crate) fn split(self) -> (CityRow, f64) {
        (
            CityRow {
                name: self.name,
                country: self.country,
                state: self.state,
                latitude: self.latitude,
                longitude: self.longitude,
                population: self.population,
                is_major_city: self.is_major_city,
                timezone: self.timezone,
            },
            self.distance_km,
        )
    }
}

/// Insertable city; `geom` is maintained by a trigger when PostGIS exists.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = cities)]
pub(crate) struct NewCityRow<'a> {
    pub name: &'a str,
    pub country: &'a str,
    pub state: Option<&'a str>,
    pub latitude: f64,
    pub longitude: f64,
    pub population: Option<i64>,
    pub is_major_city: bool,
    pub timezone: Option<&'a str>,
}

/// Row read from `analysis_bundles`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = analysis_bundles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AnalysisBundleRow {
    pub payload: serde_json::Value,
}

/// Insertable bundle payload.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = analysis_bundles)]
pub(crate) struct NewAnalysisBundleRow<'a> {
    pub coordinate_key: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub strategy: &'a str,
    pub payload: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}
