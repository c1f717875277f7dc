//! Typed, time-bounded access to the cache port.
//!
//! Cache trouble never fails a request: backend errors, timeouts, and
//! undecodable payloads are logged and treated as misses.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::ports::{CacheCategory, CacheKey, CacheStore};
use super::strategy::CacheTtls;

/// Cache handle shared by the resolvers of one service.
#[derive(Clone)]
pub struct AnalysisCache {
    store: Arc<dyn CacheStore>,
    ttls: CacheTtls,
    timeout: Duration,
}

impl AnalysisCache {
    /// Wrap `store` with per-category TTLs and a per-call timeout.
    pub fn new(store: Arc<dyn CacheStore>, ttls: CacheTtls, timeout: Duration) -> Self {
        Self {
            store,
            ttls,
            timeout,
        }
    }

    /// Read and decode a live entry.
    pub async fn fetch<T: DeserializeOwned>(&self, key: &CacheKey, category: CacheCategory) -> Option<T> {
        let outcome = tokio::time::timeout(self.timeout, self.store.get(key, category)).await;
        let payload = match outcome {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => {
                debug!(key = %key, category = category.as_str(), "cache miss");
                return None;
            }
            Ok(Err(error)) => {
                warn!(key = %key, category = category.as_str(), %error, "cache read failed");
                return None;
            }
            Err(_) => {
                warn!(key = %key, category = category.as_str(), "cache read timed out");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!(key = %key, category = category.as_str(), "cache hit");
                Some(value)
            }
            Err(error) => {
                warn!(key = %key, category = category.as_str(), %error, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Encode and store `value` with the category's TTL.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &CacheKey, category: CacheCategory, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(key = %key, category = category.as_str(), %error, "cache payload encoding failed");
                return;
            }
        };
        let ttl = self.ttls.for_category(category);
        let outcome =
            tokio::time::timeout(self.timeout, self.store.set(key, category, payload, ttl)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(key = %key, category = category.as_str(), %error, "cache write failed");
            }
            Err(_) => warn!(key = %key, category = category.as_str(), "cache write timed out"),
        }
    }
}

impl std::fmt::Debug for AnalysisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCache")
            .field("ttls", &self.ttls)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
