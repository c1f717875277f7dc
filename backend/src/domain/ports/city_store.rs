//! Port for the reference table of cities and towns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::define_port_error;
use crate::domain::Coordinate;

/// A stored reference city. Unique by `(name, country)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub coordinate: Coordinate,
    pub population: Option<u64>,
    pub is_major: bool,
    pub timezone: Option<String>,
}

/// Radius query against the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CitiesWithinRequest {
    pub center: Coordinate,
    pub radius_km: f64,
    pub limit: usize,
}

/// A city together with its distance from the query centre.
#[derive(Debug, Clone, PartialEq)]
pub struct CityDistance {
    pub city: CityRecord,
    pub distance_km: f64,
}

define_port_error! {
    /// Errors surfaced by city store adapters.
    pub enum CityStoreError {
        /// Connection could not be established or was lost.
        Connection { message: String } => "city store connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "city store query failed: {message}",
        /// The geospatial distance function or index is missing.
        FunctionUnavailable { message: String } =>
            "city store spatial query unavailable: {message}",
    }
}

/// Access to the city reference table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CityStore: Send + Sync {
    /// Cities within `radius_km` of the centre, nearest first, at most
    /// `limit` rows, using the store's spatial query.
    async fn cities_within(
        &self,
        request: &CitiesWithinRequest,
    ) -> Result<Vec<CityDistance>, CityStoreError>;

    /// Every stored city, for in-process scanning.
    async fn all_cities(&self) -> Result<Vec<CityRecord>, CityStoreError>;

    /// Insert or update cities keyed by `(name, country)`. Returns the number
    /// of rows written.
    async fn upsert_cities(&self, cities: &[CityRecord]) -> Result<usize, CityStoreError>;
}
