//! Cache store adapters.
//!
//! [`InMemoryCacheStore`] keeps entries in a concurrent map with expiry
//! measured against an injected clock. [`RedisCacheStore`] shares entries
//! across processes.

mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use dashmap::DashMap;
use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{CacheCategory, CacheEntry, CacheKey, CacheStore, CacheStoreError};

pub use self::redis::{RedisCacheStore, TtlJitter};

/// Process-local cache with per-entry expiry.
///
/// Expired entries are evicted lazily when read.
pub struct InMemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl InMemoryCacheStore {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored entries, live or not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(
        &self,
        key: &CacheKey,
        category: CacheCategory,
    ) -> Result<Option<String>, CacheStoreError> {
        let now = self.clock.utc();
        match self.entries.get(key.as_str()) {
            None => return Ok(None),
            Some(entry) if entry.category != category => return Ok(None),
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.payload.clone())),
            Some(_) => {}
        };
        debug!(key = key.as_str(), "evicting expired cache entry");
        self.entries
            .remove_if(key.as_str(), |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(
        &self,
        key: &CacheKey,
        category: CacheCategory,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let now = self.clock.utc();
        let lifetime = TimeDelta::from_std(ttl)
            .map_err(|err| CacheStoreError::serialization(format!("ttl out of range: {err}")))?;
        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| CacheStoreError::serialization("ttl overflows the calendar"))?;
        self.entries.insert(
            key.as_str().to_owned(),
            CacheEntry {
                key: key.as_str().to_owned(),
                category,
                payload,
                expires_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Expiry and namespacing of the in-process store.

    use super::*;
    use crate::test_support::{MutableClock, colombo, fixed_instant};
    use rstest::{fixture, rstest};

    struct Harness {
        clock: Arc<MutableClock>,
        store: InMemoryCacheStore,
    }

    #[fixture]
    fn harness() -> Harness {
        let clock = Arc::new(MutableClock::new(fixed_instant()));
        let store = InMemoryCacheStore::new(clock.clone());
        Harness { clock, store }
    }

    fn key() -> CacheKey {
        CacheKey::builder(CacheCategory::Geocoding, colombo()).build()
    }

    #[rstest]
    #[tokio::test]
    async fn serves_live_entries(harness: Harness) {
        harness
            .store
            .set(&key(), CacheCategory::Geocoding, "{}".to_owned(), Duration::from_secs(60))
            .await
            .expect("set succeeds");

        harness.clock.advance(Duration::from_secs(59));
        let hit = harness.store.get(&key(), CacheCategory::Geocoding).await.expect("get");
        assert_eq!(hit.as_deref(), Some("{}"));
    }

    #[rstest]
    #[tokio::test]
    async fn never_serves_at_or_after_expiry(harness: Harness) {
        harness
            .store
            .set(&key(), CacheCategory::Geocoding, "{}".to_owned(), Duration::from_secs(60))
            .await
            .expect("set succeeds");

        harness.clock.advance(Duration::from_secs(60));
        let miss = harness.store.get(&key(), CacheCategory::Geocoding).await.expect("get");
        assert!(miss.is_none());
        assert!(harness.store.is_empty(), "expired entry should be evicted");
    }

    #[rstest]
    #[tokio::test]
    async fn category_mismatch_is_a_miss(harness: Harness) {
        harness
            .store
            .set(&key(), CacheCategory::Geocoding, "{}".to_owned(), Duration::from_secs(60))
            .await
            .expect("set succeeds");

        let miss = harness.store.get(&key(), CacheCategory::Routes).await.expect("get");
        assert!(miss.is_none());
        assert_eq!(harness.store.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn last_write_wins(harness: Harness) {
        for payload in ["1", "2"] {
            harness
                .store
                .set(&key(), CacheCategory::Geocoding, payload.to_owned(), Duration::from_secs(60))
                .await
                .expect("set succeeds");
        }
        let hit = harness.store.get(&key(), CacheCategory::Geocoding).await.expect("get");
        assert_eq!(hit.as_deref(), Some("2"));
    }
}
