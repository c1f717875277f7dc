//! Adapters that misbehave on purpose.

use async_trait::async_trait;

use crate::domain::AnalysisBundle;
use crate::domain::ports::{
    AnalysisBundleRepository, AnalysisBundleRepositoryError, CitiesWithinRequest, CityDistance,
    CityRecord, CityStore, CityStoreError,
};

/// City store whose every call panics.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanickingCityStore;

#[async_trait]
impl CityStore for PanickingCityStore {
    async fn cities_within(
        &self,
        _request: &CitiesWithinRequest,
    ) -> Result<Vec<CityDistance>, CityStoreError> {
        panic!("city index corrupted");
    }

    async fn all_cities(&self) -> Result<Vec<CityRecord>, CityStoreError> {
        panic!("city index corrupted");
    }

    async fn upsert_cities(&self, _cities: &[CityRecord]) -> Result<usize, CityStoreError> {
        panic!("city index corrupted");
    }
}

/// Repository that rejects every write and finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingBundleRepository;

#[async_trait]
impl AnalysisBundleRepository for FailingBundleRepository {
    async fn upsert(&self, _bundle: &AnalysisBundle) -> Result<(), AnalysisBundleRepositoryError> {
        Err(AnalysisBundleRepositoryError::connection("database unreachable"))
    }

    async fn find_by_coordinate_key(
        &self,
        _coordinate_key: &str,
    ) -> Result<Option<AnalysisBundle>, AnalysisBundleRepositoryError> {
        Err(AnalysisBundleRepositoryError::connection("database unreachable"))
    }
}
