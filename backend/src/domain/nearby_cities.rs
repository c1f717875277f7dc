//! Nearest reference cities to a site.
//!
//! The store's spatial query is preferred. When it is unavailable or finds
//! nothing, every city is scanned in process. An empty table is seeded with
//! a small set of well-known cities and queried once more.

use std::sync::Arc;
use std::time::Duration;

use geodesy::round_to;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Coordinate;
use super::ports::{CitiesWithinRequest, CityDistance, CityRecord, CityStore, CityStoreError};
use super::resolution::{Resolved, UpstreamCalls};

/// Coarse size class of a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationTier {
    Metropolitan,
    Major,
    Town,
    Unknown,
}

impl PopulationTier {
    /// Metropolitan at 500k, major at 100k or when flagged, town when any
    /// population is known.
    pub fn classify(population: Option<u64>, is_major: bool) -> Self {
        match population {
            Some(count) if count >= 500_000 => Self::Metropolitan,
            Some(count) if count >= 100_000 => Self::Major,
            _ if is_major => Self::Major,
            Some(count) if count > 0 => Self::Town,
            _ => Self::Unknown,
        }
    }
}

/// A reference city relative to the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
    pub coordinate: Coordinate,
    pub population_tier: PopulationTier,
    pub distance_km: f64,
}

impl City {
    fn from_record(record: CityRecord, distance_km: f64) -> Self {
        Self {
            population_tier: PopulationTier::classify(record.population, record.is_major),
            name: record.name,
            country: record.country,
            coordinate: record.coordinate,
            distance_km: round_to(distance_km, 2),
        }
    }
}

/// Search radius and result limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyCityConfig {
    pub radius_km: f64,
    pub limit: usize,
}

impl Default for NearbyCityConfig {
    fn default() -> Self {
        Self {
            radius_km: 50.0,
            limit: 5,
        }
    }
}

const SEED_COUNTRY: &str = "Sri Lanka";
const SEED_TIMEZONE: &str = "Asia/Colombo";

/// (name, province, latitude, longitude, population)
const SEED_CITIES: &[(&str, &str, f64, f64, u64)] = &[
    ("Colombo", "Western", 6.9271, 79.8612, 752_993),
    ("Dehiwala-Mount Lavinia", "Western", 6.8402, 79.8712, 245_974),
    ("Negombo", "Western", 7.2008, 79.8737, 142_449),
    ("Kandy", "Central", 7.2906, 80.6337, 125_400),
    ("Galle", "Southern", 6.0535, 80.2210, 99_478),
    ("Matara", "Southern", 5.9549, 80.5550, 74_193),
    ("Jaffna", "Northern", 9.6615, 80.0255, 88_138),
    ("Trincomalee", "Eastern", 8.5874, 81.2152, 99_135),
    ("Batticaloa", "Eastern", 7.7310, 81.6747, 92_332),
    ("Anuradhapura", "North Central", 8.3114, 80.4037, 63_208),
    ("Kurunegala", "North Western", 7.4863, 80.3647, 30_315),
    ("Ratnapura", "Sabaragamuwa", 6.6828, 80.3992, 47_832),
    ("Badulla", "Uva", 6.9934, 81.0550, 47_587),
];

/// Seed set written when the city table is empty.
pub fn seed_cities() -> Vec<CityRecord> {
    SEED_CITIES
        .iter()
        .map(|(name, province, latitude, longitude, population)| CityRecord {
            name: (*name).to_owned(),
            country: SEED_COUNTRY.to_owned(),
            state: Some((*province).to_owned()),
            coordinate: Coordinate::from_static(*latitude, *longitude),
            population: Some(*population),
            is_major: true,
            timezone: Some(SEED_TIMEZONE.to_owned()),
        })
        .collect()
}

enum Lookup {
    Found(Vec<City>),
    EmptyTable,
}

/// Finds nearby cities through the city store port.
pub struct NearbyCityLocator {
    store: Arc<dyn CityStore>,
    config: NearbyCityConfig,
    timeout: Duration,
}

impl NearbyCityLocator {
    pub fn new(store: Arc<dyn CityStore>, config: NearbyCityConfig, timeout: Duration) -> Self {
        Self {
            store,
            config,
            timeout,
        }
    }

    /// Nearest cities to `center`; never fails.
    pub async fn locate(&self, center: Coordinate) -> Resolved<Vec<City>> {
        let first = match self.lookup(center).await {
            Ok(Lookup::Found(cities)) => return Resolved::fresh(cities, UpstreamCalls::NONE),
            Ok(Lookup::EmptyTable) => self.self_heal().await,
            Err(error) => Err(error),
        };
        if let Err(error) = first {
            warn!(coordinate = %center.key(), %error, "nearby city lookup failed");
            return Resolved::fallback(Vec::new(), UpstreamCalls::NONE, error.to_string());
        }

        match self.lookup(center).await {
            Ok(Lookup::Found(cities)) => Resolved::fresh(cities, UpstreamCalls::NONE),
            Ok(Lookup::EmptyTable) => Resolved::fallback(
                Vec::new(),
                UpstreamCalls::NONE,
                "city table still empty after seeding",
            ),
            Err(error) => {
                warn!(coordinate = %center.key(), %error, "nearby city lookup failed after seeding");
                Resolved::fallback(Vec::new(), UpstreamCalls::NONE, error.to_string())
            }
        }
    }

    async fn self_heal(&self) -> Result<(), CityStoreError> {
        let seeds = seed_cities();
        warn!(count = seeds.len(), "city reference table is empty; seeding reference cities");
        let written = self.bounded(self.store.upsert_cities(&seeds)).await?;
        debug!(written, "seeded reference cities");
        Ok(())
    }

    async fn lookup(&self, center: Coordinate) -> Result<Lookup, CityStoreError> {
        let request = CitiesWithinRequest {
            center,
            radius_km: self.config.radius_km,
            limit: self.config.limit,
        };
        match self.bounded(self.store.cities_within(&request)).await {
            Ok(rows) if !rows.is_empty() => {
                return Ok(Lookup::Found(
                    rows.into_iter()
                        .map(|CityDistance { city, distance_km }| City::from_record(city, distance_km))
                        .collect(),
                ));
            }
            Ok(_) => debug!(coordinate = %center.key(), "spatial city query returned no rows; scanning"),
            Err(CityStoreError::FunctionUnavailable { message }) => {
                debug!(coordinate = %center.key(), %message, "spatial city query unavailable; scanning");
            }
            Err(error) => warn!(coordinate = %center.key(), %error, "spatial city query failed; scanning"),
        }

        let all = self.bounded(self.store.all_cities()).await?;
        if all.is_empty() {
            return Ok(Lookup::EmptyTable);
        }
        Ok(Lookup::Found(scan(all, &request)))
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, CityStoreError>>,
    ) -> Result<T, CityStoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CityStoreError::connection(format!("timed out after {}ms", self.timeout.as_millis())))?
    }
}

/// In-process Haversine filter, nearest first.
pub fn scan(cities: Vec<CityRecord>, request: &CitiesWithinRequest) -> Vec<City> {
    let mut within: Vec<(f64, CityRecord)> = cities
        .into_iter()
        .map(|city| (request.center.distance_meters(&city.coordinate) / 1_000.0, city))
        .filter(|(distance_km, _)| *distance_km <= request.radius_km)
        .collect();
    within.sort_by(|(a, a_city), (b, b_city)| a.total_cmp(b).then_with(|| a_city.name.cmp(&b_city.name)));
    within
        .into_iter()
        .take(request.limit)
        .map(|(distance_km, city)| City::from_record(city, distance_km))
        .collect()
}
