//! Port interface for the time-to-live cache of analysis fragments.
//!
//! Adapters store opaque JSON payloads; typed access and timeouts live in
//! [`crate::domain::cache_access`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CacheKey, define_port_error};

/// Independent cache namespaces, each with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Geocoding,
    AdminHierarchy,
    PoiData,
    Imagery,
    Routes,
}

impl CacheCategory {
    /// Identifier embedded in cache keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Geocoding => "geocoding",
            Self::AdminHierarchy => "admin_hierarchy",
            Self::PoiData => "poi_data",
            Self::Imagery => "imagery",
            Self::Routes => "routes",
        }
    }
}

/// A stored payload with its absolute expiry.
///
/// Entries are never served at or after `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Full cache key the entry was written under.
    pub key: String,
    /// Namespace the entry was written under.
    pub category: CacheCategory,
    /// Serialised JSON payload.
    pub payload: String,
    /// Instant after which the entry is a miss.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

define_port_error! {
    /// Errors surfaced by cache adapters.
    pub enum CacheStoreError {
        /// Cache backend is unavailable or timing out.
        Backend { message: String } => "cache backend failure: {message}",
        /// Stored content could not be encoded or decoded.
        Serialization { message: String } => "cache serialisation failed: {message}",
    }
}

/// Key/value store with per-entry expiry.
///
/// Concurrent writers to one key are last-write-wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a live payload for `key`, or `None` on miss or expiry.
    async fn get(
        &self,
        key: &CacheKey,
        category: CacheCategory,
    ) -> Result<Option<String>, CacheStoreError>;

    /// Store `payload` under `key` for at most `ttl`.
    async fn set(
        &self,
        key: &CacheKey,
        category: CacheCategory,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError>;
}

/// Cache that never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCacheStore;

#[async_trait]
impl CacheStore for FixtureCacheStore {
    async fn get(
        &self,
        _key: &CacheKey,
        _category: CacheCategory,
    ) -> Result<Option<String>, CacheStoreError> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &CacheKey,
        _category: CacheCategory,
        _payload: String,
        _ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        Ok(())
    }
}
