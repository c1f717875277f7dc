//! PostgreSQL-backed city reference store.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Double};
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use tracing::warn;

use crate::domain::Coordinate;
use crate::domain::ports::{
    CitiesWithinRequest, CityDistance, CityRecord, CityStore, CityStoreError,
};

use super::diesel_helpers::{is_connection_error, is_missing_spatial_support, map_diesel_error_message};
use super::models::{CityDistanceRow, CityRow, NewCityRow};
use super::pool::{DbPool, PoolError};
use super::schema::cities;

/// Radius query; `$1` latitude, `$2` longitude, `$3` metres, `$4` limit.
const CITIES_WITHIN_SQL: &str = r"
SELECT name, country, state, latitude, longitude, population, is_major_city, timezone,
       ST_Distance(geom, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography) / 1000.0 AS distance_km
FROM cities
WHERE geom IS NOT NULL
  AND ST_DWithin(geom, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $3)
ORDER BY distance_km, name
LIMIT $4
";

/// Diesel implementation of [`CityStore`].
#[derive(Clone)]
pub struct DieselCityStore {
    pool: DbPool,
}

impl DieselCityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> CityStoreError {
    CityStoreError::connection(error.into_message())
}

fn map_diesel_error(error: &diesel::result::Error, operation: &str) -> CityStoreError {
    let message = map_diesel_error_message(error, operation);
    if is_missing_spatial_support(error) {
        CityStoreError::function_unavailable(message)
    } else if is_connection_error(error) {
        CityStoreError::connection(message)
    } else {
        CityStoreError::query(message)
    }
}

/// Rows with impossible coordinates are dropped with a warning.
fn into_record(row: CityRow) -> Option<CityRecord> {
    let coordinate = match Coordinate::new(row.latitude, row.longitude) {
        Ok(coordinate) => coordinate,
        Err(error) => {
            warn!(city = %row.name, %error, "skipping city with invalid coordinates");
            return None;
        }
    };
    Some(CityRecord {
        name: row.name,
        country: row.country,
        state: row.state,
        coordinate,
        population: row.population.and_then(|count| u64::try_from(count).ok()),
        is_major: row.is_major_city,
        timezone: row.timezone,
    })
}

#[async_trait]
impl CityStore for DieselCityStore {
    async fn cities_within(
        &self,
        request: &CitiesWithinRequest,
    ) -> Result<Vec<CityDistance>, CityStoreError> {
        let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CityDistanceRow> = sql_query(CITIES_WITHIN_SQL)
            .bind::<Double, _>(request.center.latitude())
            .bind::<Double, _>(request.center.longitude())
            .bind::<Double, _>(request.radius_km * 1_000.0)
            .bind::<BigInt, _>(limit)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "cities within radius"))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let (city, distance_km) = row.split();
                into_record(city).map(|city| CityDistance { city, distance_km })
            })
            .collect())
    }

    async fn all_cities(&self) -> Result<Vec<CityRecord>, CityStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CityRow> = cities::table
            .select(CityRow::as_select())
            .order(cities::name.asc())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "list cities"))?;
        Ok(rows.into_iter().filter_map(into_record).collect())
    }

    async fn upsert_cities(&self, records: &[CityRecord]) -> Result<usize, CityStoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows = records
            .iter()
            .map(|record| {
                let population = record
                    .population
                    .map(i64::try_from)
                    .transpose()
                    .map_err(|_| {
                        CityStoreError::query(format!("population of {} overflows", record.name))
                    })?;
                Ok(NewCityRow {
                    name: &record.name,
                    country: &record.country,
                    state: record.state.as_deref(),
                    latitude: record.coordinate.latitude(),
                    longitude: record.coordinate.longitude(),
                    population,
                    is_major_city: record.is_major,
                    timezone: record.timezone.as_deref(),
                })
            })
            .collect::<Result<Vec<_>, CityStoreError>>()?;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(cities::table)
            .values(&rows)
            .on_conflict((cities::name, cities::country))
            .do_update()
            .set((
                cities::state.eq(excluded(cities::state)),
                cities::latitude.eq(excluded(cities::latitude)),
                cities::longitude.eq(excluded(cities::longitude)),
                cities::population.eq(excluded(cities::population)),
                cities::is_major_city.eq(excluded(cities::is_major_city)),
                cities::timezone.eq(excluded(cities::timezone)),
                cities::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "upsert cities"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(latitude: f64, population: Option<i64>) -> CityRow {
        CityRow {
            name: "Kandy".to_owned(),
            country: "Sri Lanka".to_owned(),
            state: Some("Central".to_owned()),
            latitude,
            longitude: 80.6337,
            population,
            is_major_city: true,
            timezone: Some("Asia/Colombo".to_owned()),
        }
    }

    #[rstest]
    fn converts_rows_into_records() {
        let record = into_record(row(7.2906, Some(125_400))).expect("valid row");
        assert_eq!(record.population, Some(125_400));
        assert!(record.is_major);
    }

    #[rstest]
    fn negative_population_is_dropped() {
        let record = into_record(row(7.2906, Some(-1))).expect("valid row");
        assert_eq!(record.population, None);
    }

    #[rstest]
    fn impossible_coordinates_are_skipped() {
        assert!(into_record(row(123.0, None)).is_none());
    }
}
