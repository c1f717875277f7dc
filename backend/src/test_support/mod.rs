//! Deterministic doubles shared by unit, integration, and behaviour tests.

mod clock;
mod fixtures;
mod gateway;
mod stores;

pub use clock::MutableClock;
pub use fixtures::{colombo, colombo_places, colombo_reverse_geocode, coordinate, fixed_instant};
pub use gateway::{GatewayCalls, ScriptedGeoGateway};
pub use stores::{FailingBundleRepository, PanickingCityStore};
