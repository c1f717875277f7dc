//! Domain layer: site analysis semantics independent of any provider,
//! cache, or database.
//!
//! Resolvers take their collaborators as port trait objects, return
//! [`Resolved`] values carrying request-scoped call counts, and never fail;
//! only request validation produces an [`Error`].

pub mod address;
pub mod admin_hierarchy;
pub mod bundle;
pub mod cache_access;
pub mod category;
pub mod coordinate;
pub mod cost;
pub mod error;
pub mod fallback;
pub mod imagery;
pub mod nearby_cities;
pub mod orchestrator;
pub mod poi_locator;
pub mod ports;
pub mod request;
pub mod resolution;
pub mod route;
pub mod router;
pub mod strategy;
pub mod upstream_guard;

pub use self::address::{Address, AddressResolver};
pub use self::admin_hierarchy::{AdministrativeHierarchy, AdministrativeHierarchyResolver};
pub use self::bundle::{AnalysisBundle, Branch, BranchReport};
pub use self::cache_access::AnalysisCache;
pub use self::category::{
    CatalogueError, CategoryCatalogue, CategoryGroup, CategoryGrouping, FacilityCategory,
};
pub use self::coordinate::{Coordinate, CoordinateValidationError, OperatingBounds};
pub use self::cost::{BudgetAdvisory, CostEstimate, CostEstimator, RateTable};
pub use self::error::{Error, ErrorCode};
pub use self::fallback::{FallbackLadder, Tiered};
pub use self::imagery::{ImageryReference, ImageryReferenceBuilder, ImageryView};
pub use self::nearby_cities::{City, NearbyCityConfig, NearbyCityLocator, PopulationTier};
pub use self::orchestrator::{SiteAnalysisConfig, SiteAnalysisPorts, SiteAnalysisService};
pub use self::poi_locator::{PoiLocator, PoiSearch, PointOfInterest};
pub use self::request::{AnalysisRequest, AnalysisRequestInput};
pub use self::resolution::{BranchStatus, Resolved, UpstreamCalls};
pub use self::route::{DirectionResult, RouteStep, RouteTier, TravelMode};
pub use self::router::Router;
pub use self::strategy::{AnalysisStrategy, CacheTtls, ReferenceLocation, StrategyKind};
pub use self::upstream_guard::GuardedGeoGateway;
