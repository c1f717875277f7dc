//! Process-local adapters used when no database is configured.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::AnalysisBundle;
use crate::domain::ports::{
    AnalysisBundleRepository, AnalysisBundleRepositoryError, CitiesWithinRequest, CityDistance,
    CityRecord, CityStore, CityStoreError,
};

/// City table held in memory, keyed by `(name, country)`.
///
/// With spatial support disabled, `cities_within` reports the query as
/// unavailable, which mirrors a database without PostGIS.
#[derive(Debug, Default)]
pub struct InMemoryCityStore {
    rows: RwLock<Vec<CityRecord>>,
    spatial: bool,
}

impl InMemoryCityStore {
    /// Store answering spatial queries.
    pub fn spatial() -> Self {
        Self {
            rows: RwLock::default(),
            spatial: true,
        }
    }

    /// Store that can only be scanned.
    pub fn scan_only() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cities(self, cities: Vec<CityRecord>) -> Self {
        Self {
            rows: RwLock::new(cities),
            spatial: self.spatial,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<CityRecord>>, CityStoreError> {
        self.rows
            .read()
            .map_err(|_| CityStoreError::query("city table lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<CityRecord>>, CityStoreError> {
        self.rows
            .write()
            .map_err(|_| CityStoreError::query("city table lock poisoned"))
    }
}

#[async_trait]
impl CityStore for InMemoryCityStore {
    async fn cities_within(
        &self,
        request: &CitiesWithinRequest,
    ) -> Result<Vec<CityDistance>, CityStoreError> {
        if !self.spatial {
            return Err(CityStoreError::function_unavailable(
                "in-memory store has no spatial index",
            ));
        }
        let mut within: Vec<CityDistance> = self
            .read()?
            .iter()
            .map(|city| CityDistance {
                distance_km: request.center.distance_meters(&city.coordinate) / 1_000.0,
                city: city.clone(),
            })
            .filter(|row| row.distance_km <= request.radius_km)
            .collect();
        within.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        within.truncate(request.limit);
        Ok(within)
    }

    async fn all_cities(&self) -> Result<Vec<CityRecord>, CityStoreError> {
        Ok(self.read()?.clone())
    }

    async fn upsert_cities(&self, cities: &[CityRecord]) -> Result<usize, CityStoreError> {
        let mut rows = self.write()?;
        for city in cities {
            match rows
                .iter_mut()
                .find(|row| row.name == city.name && row.country == city.country)
            {
                Some(existing) => existing.clone_from(city),
                None => rows.push(city.clone()),
            }
        }
        Ok(cities.len())
    }
}

/// Bundles held in memory, keyed by coordinate key.
#[derive(Debug, Default)]
pub struct InMemoryBundleRepository {
    bundles: DashMap<String, AnalysisBundle>,
}

impl InMemoryBundleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[async_trait]
impl AnalysisBundleRepository for InMemoryBundleRepository {
    async fn upsert(&self, bundle: &AnalysisBundle) -> Result<(), AnalysisBundleRepositoryError> {
        self.bundles
            .insert(bundle.coordinate_key.clone(), bundle.clone());
        Ok(())
    }

    async fn find_by_coordinate_key(
        &self,
        coordinate_key: &str,
    ) -> Result<Option<AnalysisBundle>, AnalysisBundleRepositoryError> {
        Ok(self
            .bundles
            .get(coordinate_key)
            .map(|bundle| bundle.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    //! Spatial filtering and upsert semantics.

    use super::*;
    use crate::domain::nearby_cities::seed_cities;
    use crate::test_support::colombo;
    use rstest::rstest;

    fn request(radius_km: f64, limit: usize) -> CitiesWithinRequest {
        CitiesWithinRequest {
            center: colombo(),
            radius_km,
            limit,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn spatial_query_is_nearest_first_and_limited() {
        let store = InMemoryCityStore::spatial().with_cities(seed_cities());
        let rows = store.cities_within(&request(50.0, 2)).await.expect("query");
        let names: Vec<_> = rows.iter().map(|row| row.city.name.as_str()).collect();
        assert_eq!(names, ["Colombo", "Dehiwala-Mount Lavinia"]);
        assert!(rows.iter().all(|row| row.distance_km <= 50.0));
    }

    #[rstest]
    #[tokio::test]
    async fn scan_only_store_reports_function_unavailable() {
        let store = InMemoryCityStore::scan_only().with_cities(seed_cities());
        let err = store
            .cities_within(&request(50.0, 5))
            .await
            .expect_err("no spatial support");
        assert!(matches!(err, CityStoreError::FunctionUnavailable { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn upsert_replaces_on_name_and_country() {
        let store = InMemoryCityStore::scan_only();
        let mut cities = seed_cities();
        store.upsert_cities(&cities).await.expect("first upsert");
        let colombo = cities.first_mut().expect("seed");
        colombo.population = Some(1);
        store
            .upsert_cities(std::slice::from_ref(colombo))
            .await
            .expect("second upsert");

        let all = store.all_cities().await.expect("scan");
        assert_eq!(all.len(), seed_cities().len());
        let stored = all.iter().find(|city| city.name == "Colombo").expect("colombo");
        assert_eq!(stored.population, Some(1));
    }
}
