//! Redis-backed cache store.
//!
//! Payloads are wrapped in a JSON [`CacheEntry`] envelope so a reader can
//! reject entries written under another category, and TTLs are jittered
//! downwards to spread expiry across a fleet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::AsyncCommands;
use chrono::TimeDelta;
use mockable::Clock;
use rand::Rng;
use tracing::{debug, warn};

use crate::domain::ports::{CacheCategory, CacheEntry, CacheKey, CacheStore, CacheStoreError};

/// Downward-only TTL randomisation.
///
/// A stored entry lives for between `(1 - max_fraction) * ttl` and `ttl`;
/// jitter never extends a lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtlJitter {
    max_fraction: f64,
}

impl TtlJitter {
    /// Default share of the TTL that may be shaved off.
    pub const DEFAULT_FRACTION: f64 = 0.1;

    /// Clamp `max_fraction` into `0.0..=1.0`; non-finite values disable
    /// jitter.
    pub fn new(max_fraction: f64) -> Self {
        let max_fraction = if max_fraction.is_finite() {
            max_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { max_fraction }
    }

    pub const fn none() -> Self {
        Self { max_fraction: 0.0 }
    }

    /// Shorten `ttl` by a random share of at most `max_fraction`.
    pub fn shorten<R: Rng + ?Sized>(&self, ttl: Duration, rng: &mut R) -> Duration {
        if self.max_fraction <= 0.0 {
            return ttl;
        }
        let cut = rng.gen_range(0.0..=self.max_fraction);
        ttl.mul_f64(1.0 - cut).min(ttl)
    }
}

impl Default for TtlJitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRACTION)
    }
}

/// Cache store sharing entries through Redis.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool<RedisConnectionManager>,
    clock: Arc<dyn Clock + Send + Sync>,
    jitter: TtlJitter,
}

impl RedisCacheStore {
    /// Connect a pool to `redis_url`.
    pub async fn connect(
        redis_url: &str,
        clock: Arc<dyn Clock + Send + Sync>,
        jitter: TtlJitter,
    ) -> Result<Self, CacheStoreError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|err| CacheStoreError::backend(err.to_string()))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|err| CacheStoreError::backend(err.to_string()))?;
        Ok(Self {
            pool,
            clock,
            jitter,
        })
    }

    fn lifetime(&self, ttl: Duration) -> Duration {
        self.jitter.shorten(ttl, &mut rand::thread_rng())
    }
}

fn decode_envelope(raw: &str) -> Result<CacheEntry, CacheStoreError> {
    serde_json::from_str(raw).map_err(|err| CacheStoreError::serialization(err.to_string()))
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(
        &self,
        key: &CacheKey,
        category: CacheCategory,
    ) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| CacheStoreError::backend(err.to_string()))?;
        let raw: Option<String> = conn
            .get(key.as_str())
            .await
            .map_err(|err| CacheStoreError::backend(err.to_string()))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let entry = decode_envelope(&raw)?;
        if entry.key != key.as_str() {
            warn!(
                key = key.as_str(),
                stored = entry.key.as_str(),
                "cache entry key mismatch; treating as miss"
            );
            return Ok(None);
        }
        if entry.category != category {
            warn!(key = key.as_str(), "cache entry category mismatch; treating as miss");
            return Ok(None);
        }
        if !entry.is_live(self.clock.utc()) {
            debug!(key = key.as_str(), "cache entry outlived its expiry");
            return Ok(None);
        }
        Ok(Some(entry.payload))
    }

    async fn set(
        &self,
        key: &CacheKey,
        category: CacheCategory,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let lifetime = self.lifetime(ttl);
        let seconds = lifetime.as_secs();
        if seconds == 0 {
            return Ok(());
        }
        let delta = TimeDelta::from_std(lifetime)
            .map_err(|err| CacheStoreError::serialization(format!("ttl out of range: {err}")))?;
        let expires_at = self
            .clock
            .utc()
            .checked_add_signed(delta)
            .ok_or_else(|| CacheStoreError::serialization("ttl overflows the calendar"))?;
        let envelope = serde_json::to_string(&CacheEntry {
            key: key.as_str().to_owned(),
            category,
            payload,
            expires_at,
        })
        .map_err(|err| CacheStoreError::serialization(err.to_string()))?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| CacheStoreError::backend(err.to_string()))?;
        conn.set_ex::<_, _, ()>(key.as_str(), envelope, seconds)
            .await
            .map_err(|err| CacheStoreError::backend(err.to_string()))
    }
}
