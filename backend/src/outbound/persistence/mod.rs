//! PostgreSQL persistence adapters using Diesel with async support.
//!
//! Repositories only translate between Diesel rows and domain types. Row
//! structs and table definitions stay private to this module.
//!
//! ```ignore
//! use geo_analysis::outbound::persistence::{DbPool, DieselCityStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/geo")).await?;
//! let cities = DieselCityStore::new(pool);
//! ```

mod diesel_bundle_repository;
mod diesel_city_store;
mod diesel_helpers;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_bundle_repository::DieselAnalysisBundleRepository;
pub use diesel_city_store::DieselCityStore;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
