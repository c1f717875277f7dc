//! Outbound adapters implementing domain ports.
//!
//! - **google**: Google Maps Platform gateway over `reqwest`
//! - **cache**: in-process and Redis cache stores
//! - **persistence**: PostgreSQL city store and bundle repository
//! - **memory**: in-process city store and bundle repository
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod cache;
pub mod google;
pub mod memory;
pub mod persistence;
