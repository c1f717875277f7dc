//! PostgreSQL-backed analysis bundle repository.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::AnalysisBundle;
use crate::domain::ports::{AnalysisBundleRepository, AnalysisBundleRepositoryError};

use super::diesel_helpers::{is_connection_error, map_diesel_error_message};
use super::models::{AnalysisBundleRow, NewAnalysisBundleRow};
use super::pool::{DbPool, PoolError};
use super::schema::analysis_bundles;

/// Stores bundles as JSONB keyed by coordinate key.
#[derive(Clone)]
pub struct DieselAnalysisBundleRepository {
    pool: DbPool,
}

impl DieselAnalysisBundleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> AnalysisBundleRepositoryError {
    AnalysisBundleRepositoryError::connection(error.into_message())
}

fn map_diesel_error(error: &diesel::result::Error, operation: &str) -> AnalysisBundleRepositoryError {
    let message = map_diesel_error_message(error, operation);
    if is_connection_error(error) {
        AnalysisBundleRepositoryError::connection(message)
    } else {
        AnalysisBundleRepositoryError::query(message)
    }
}

#[async_trait]
impl AnalysisBundleRepository for DieselAnalysisBundleRepository {
    async fn upsert(&self, bundle: &AnalysisBundle) -> Result<(), AnalysisBundleRepositoryError> {
        let payload = serde_json::to_value(bundle)
            .map_err(|err| AnalysisBundleRepositoryError::serialization(err.to_string()))?;
        let row = NewAnalysisBundleRow {
            coordinate_key: &bundle.coordinate_key,
            latitude: bundle.coordinate.latitude(),
            longitude: bundle.coordinate.longitude(),
            strategy: bundle.strategy.as_str(),
            payload,
            generated_at: bundle.generated_at,
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(analysis_bundles::table)
            .values(&row)
            .on_conflict(analysis_bundles::coordinate_key)
            .do_update()
            .set((
                analysis_bundles::latitude.eq(excluded(analysis_bundles::latitude)),
                analysis_bundles::longitude.eq(excluded(analysis_bundles::longitude)),
                analysis_bundles::strategy.eq(excluded(analysis_bundles::strategy)),
                analysis_bundles::payload.eq(excluded(analysis_bundles::payload)),
                analysis_bundles::generated_at.eq(excluded(analysis_bundles::generated_at)),
                analysis_bundles::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "upsert analysis bundle"))?;
        Ok(())
    }

    async fn find_by_coordinate_key(
        &self,
        coordinate_key: &str,
    ) -> Result<Option<AnalysisBundle>, AnalysisBundleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AnalysisBundleRow> = analysis_bundles::table
            .filter(analysis_bundles::coordinate_key.eq(coordinate_key))
            .select(AnalysisBundleRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err, "find analysis bundle"))?;

        row.map(|row| {
            serde_json::from_value(row.payload)
                .map_err(|err| AnalysisBundleRepositoryError::serialization(err.to_string()))
        })
        .transpose()
    }
}
