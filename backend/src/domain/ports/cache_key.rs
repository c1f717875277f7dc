//! Namespaced, fingerprinted cache keys.
//!
//! Keys look like `geo:v1:{category}:{sha256}` where the digest covers a
//! canonical rendering of the rounded coordinate and every parameter that
//! changes the cached payload.

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::cache_store::CacheCategory;
use crate::domain::Coordinate;

/// Prefix shared by every key this service writes.
pub const KEY_NAMESPACE: &str = "geo:v1";

/// Cache key used to store and retrieve analysis fragments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Construct a key after checking it is non-empty and trimmed.
    pub fn new(value: impl Into<String>) -> Result<Self, CacheKeyValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(CacheKeyValidationError::Empty);
        }
        if raw.trim() != raw {
            return Err(CacheKeyValidationError::ContainsWhitespace);
        }
        Ok(Self(raw))
    }

    /// Start building a fingerprinted key for `category` at `coordinate`.
    ///
    /// # Examples
    /// ```
    /// use geo_analysis::domain::Coordinate;
    /// use geo_analysis::domain::ports::{CacheCategory, CacheKey};
    ///
    /// let here = Coordinate::new(6.9271, 79.8612).expect("valid");
    /// let key = CacheKey::builder(CacheCategory::PoiData, here)
    ///     .param("radius_m", 2000)
    ///     .build();
    /// assert!(key.as_str().starts_with("geo:v1:poi_data:"));
    /// ```
    pub fn builder(category: CacheCategory, coordinate: Coordinate) -> CacheKeyBuilder {
        CacheKeyBuilder {
            category,
            coordinate_key: coordinate.key(),
            params: Vec::new(),
        }
    }

    /// Borrow the underlying key.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Validation errors returned when constructing [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheKeyValidationError {
    /// Key is empty after trimming whitespace.
    #[error("cache key must not be empty")]
    Empty,
    /// Key contains leading or trailing whitespace.
    #[error("cache key must not contain surrounding whitespace")]
    ContainsWhitespace,
}

/// Accumulates key parameters; parameter order does not affect the digest.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    category: CacheCategory,
    coordinate_key: String,
    params: Vec<(String, String)>,
}

impl CacheKeyBuilder {
    /// Add a named parameter.
    pub fn param(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        self.params.push((name.to_owned(), value.to_string()));
        self
    }

    /// Canonical text the digest is computed over.
    pub fn canonical(&self) -> String {
        let mut params = self.params.clone();
        params.sort();
        let mut canonical = format!("at={}", self.coordinate_key);
        for (name, value) in params {
            canonical.push('|');
            canonical.push_str(&name);
            canonical.push('=');
            canonical.push_str(&value);
        }
        canonical
    }

    /// Finish the key.
    pub fn build(self) -> CacheKey {
        let digest = Sha256::digest(self.canonical().as_bytes());
        CacheKey(format!(
            "{KEY_NAMESPACE}:{}:{}",
            self.category.as_str(),
            hex::encode(digest)
        ))
    }
}
