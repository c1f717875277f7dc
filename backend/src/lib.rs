//! Geospatial site analysis: enrich a coordinate with address,
//! administrative, facility, routing, nearby-city, and imagery context.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::AnalysisSettings;
