//! Port for persisting completed analysis bundles.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::AnalysisBundle;

define_port_error! {
    /// Errors surfaced by bundle repositories.
    pub enum AnalysisBundleRepositoryError {
        /// Connection could not be established or was lost.
        Connection { message: String } => "bundle repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "bundle repository query failed: {message}",
        /// Stored payload could not be encoded or decoded.
        Serialization { message: String } => "bundle payload serialisation failed: {message}",
    }
}

/// Storage for the latest bundle per rounded coordinate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisBundleRepository: Send + Sync {
    /// Insert or replace the bundle stored under its coordinate key.
    async fn upsert(
        &self,
        bundle: &AnalysisBundle,
    ) -> Result<(), AnalysisBundleRepositoryError>;

    /// Most recent bundle for `coordinate_key`.
    async fn find_by_coordinate_key(
        &self,
        coordinate_key: &str,
    ) -> Result<Option<AnalysisBundle>, AnalysisBundleRepositoryError>;
}

/// Repository that stores nothing and always reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAnalysisBundleRepository;

#[async_trait]
impl AnalysisBundleRepository for FixtureAnalysisBundleRepository {
    async fn upsert(
        &self,
        _bundle: &AnalysisBundle,
    ) -> Result<(), AnalysisBundleRepositoryError> {
        Ok(())
    }

    async fn find_by_coordinate_key(
        &self,
        _coordinate_key: &str,
    ) -> Result<Option<AnalysisBundle>, AnalysisBundleRepositoryError> {
        Ok(None)
    }
}
