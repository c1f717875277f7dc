//! Local administrative tiers derived from a resolved address.
//!
//! Sri Lanka nests provinces, districts, divisional secretariat divisions,
//! and grama niladhari divisions. Tiers the provider does not surface are
//! reported as [`UNKNOWN`].

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::Coordinate;
use super::address::Address;
use super::cache_access::AnalysisCache;
use super::ports::{CacheCategory, CacheKey};
use super::resolution::{BranchStatus, Resolved, UpstreamCalls};

/// Placeholder for tiers that could not be resolved.
pub const UNKNOWN: &str = "unknown";

/// Administrative regions containing a coordinate. No field is ever empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministrativeHierarchy {
    pub country: String,
    pub province: String,
    pub district: String,
    pub divisional_secretariat: String,
    pub grama_niladhari_division: String,
    pub locality: String,
}

impl AdministrativeHierarchy {
    /// Every tier set to [`UNKNOWN`].
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_owned(),
            province: UNKNOWN.to_owned(),
            district: UNKNOWN.to_owned(),
            divisional_secretariat: UNKNOWN.to_owned(),
            grama_niladhari_division: UNKNOWN.to_owned(),
            locality: UNKNOWN.to_owned(),
        }
    }

    /// Map provider address components onto the tiers.
    pub fn from_address(address: &Address) -> Self {
        let pick = |kinds: &[&str], suffixes: &[&str]| -> String {
            kinds
                .iter()
                .find_map(|kind| address.component(kind))
                .map(|component| trim_suffixes(&component.long_name, suffixes))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_owned())
        };
        Self {
            country: pick(&["country"], &[]),
            province: pick(&["administrative_area_level_1"], &[" Province"]),
            district: pick(&["administrative_area_level_2"], &[" District"]),
            divisional_secretariat: pick(
                &["administrative_area_level_3"],
                &[" Divisional Secretariat", " DS Division"],
            ),
            grama_niladhari_division: pick(
                &["administrative_area_level_4", "sublocality_level_1", "neighborhood"],
                &[" GN Division", " Grama Niladhari Division"],
            ),
            locality: pick(&["locality", "postal_town", "sublocality"], &[]),
        }
    }

    fn resolved_tiers(&self) -> usize {
        [
            &self.province,
            &self.district,
            &self.divisional_secretariat,
            &self.grama_niladhari_division,
            &self.locality,
        ]
        .into_iter()
        .filter(|tier| tier.as_str() != UNKNOWN)
        .count()
    }
}

fn trim_suffixes(name: &str, suffixes: &[&str]) -> String {
    let trimmed = name.trim();
    suffixes
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .trim()
        .to_owned()
}

/// Derives and caches administrative tiers.
pub struct AdministrativeHierarchyResolver {
    cache: AnalysisCache,
}

impl AdministrativeHierarchyResolver {
    pub fn new(cache: AnalysisCache) -> Self {
        Self { cache }
    }

    /// Tiers for `coordinate`.
    ///
    /// `address` is only awaited on a cache miss, so the resolver never
    /// causes a geocode of its own. Provider calls are accounted to whoever
    /// produced the address.
    pub async fn resolve<F, Fut>(&self, coordinate: Coordinate, address: F) -> Resolved<AdministrativeHierarchy>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Resolved<Address>>,
    {
        let key = CacheKey::builder(CacheCategory::AdminHierarchy, coordinate).build();
        if let Some(hierarchy) = self.cache.fetch(&key, CacheCategory::AdminHierarchy).await {
            return Resolved::cached(hierarchy);
        }

        let address = address().await;
        if address.value.is_stub {
            let reason = address
                .error
                .unwrap_or_else(|| "address unavailable".to_owned());
            return Resolved::fallback(AdministrativeHierarchy::unknown(), UpstreamCalls::NONE, reason);
        }

        let hierarchy = AdministrativeHierarchy::from_address(&address.value);
        match hierarchy.resolved_tiers() {
            0 => Resolved::fallback(hierarchy, UpstreamCalls::NONE, "address has no administrative components"),
            _ => {
                self.cache.store(&key, CacheCategory::AdminHierarchy, &hierarchy).await;
                let status = if address.status == BranchStatus::Cached {
                    BranchStatus::Cached
                } else {
                    BranchStatus::Fresh
                };
                Resolved {
                    value: hierarchy,
                    status,
                    error: None,
                    calls: UpstreamCalls::NONE,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Component mapping and placeholder defaults.

    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::ports::{AddressComponent, FixtureCacheStore};
    use crate::domain::strategy::CacheTtls;
    use rstest::rstest;

    fn component(name: &str, kind: &str) -> AddressComponent {
        AddressComponent {
            long_name: name.to_owned(),
            short_name: name.to_owned(),
            kinds: vec![kind.to_owned(), "political".to_owned()],
        }
    }

    fn colombo_address() -> Address {
        Address {
            formatted_address: "Kollupitiya, Colombo, Sri Lanka".to_owned(),
            place_id: None,
            components: vec![
                component("Kollupitiya", "sublocality_level_1"),
                component("Colombo", "locality"),
                component("Colombo District", "administrative_area_level_2"),
                component("Western Province", "administrative_area_level_1"),
                component("Sri Lanka", "country"),
            ],
            is_stub: false,
        }
    }

    fn here() -> Coordinate {
        Coordinate::new(6.9271, 79.8612).expect("valid")
    }

    fn resolver() -> AdministrativeHierarchyResolver {
        AdministrativeHierarchyResolver::new(AnalysisCache::new(
            Arc::new(FixtureCacheStore),
            CacheTtls::default(),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn maps_components_and_trims_suffixes() {
        let hierarchy = AdministrativeHierarchy::from_address(&colombo_address());
        assert_eq!(hierarchy.province, "Western");
        assert_eq!(hierarchy.district, "Colombo");
        assert_eq!(hierarchy.grama_niladhari_division, "Kollupitiya");
        assert_eq!(hierarchy.locality, "Colombo");
        assert_eq!(hierarchy.divisional_secretariat, UNKNOWN);
    }

    #[rstest]
    #[case("Thimbirigasyaya Divisional Secretariat", "Thimbirigasyaya")]
    #[case("Kandy Four Gravets DS Division", "Kandy Four Gravets")]
    #[case("Maharagama", "Maharagama")]
    fn trims_known_division_suffixes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(
            trim_suffixes(raw, &[" Divisional Secretariat", " DS Division"]),
            expected
        );
    }

    #[tokio::test]
    async fn stub_address_gives_unknown_tiers() {
        let resolved = resolver()
            .resolve(here(), || async {
                Resolved::fallback(Address::stub(here()), UpstreamCalls::geocode(1), "timeout")
            })
            .await;
        assert_eq!(resolved.status, BranchStatus::Fallback);
        assert_eq!(resolved.value, AdministrativeHierarchy::unknown());
        assert_eq!(resolved.calls, UpstreamCalls::NONE);
        assert_eq!(resolved.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn real_address_resolves_without_calls() {
        let resolved = resolver()
            .resolve(here(), || async {
                Resolved::fresh(colombo_address(), UpstreamCalls::geocode(1))
            })
            .await;
        assert_eq!(resolved.status, BranchStatus::Fresh);
        assert_eq!(resolved.value.district, "Colombo");
        assert_eq!(resolved.calls, UpstreamCalls::NONE);
    }
}
