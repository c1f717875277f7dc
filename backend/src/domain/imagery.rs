//! Static imagery references for a site.
//!
//! Building a reference is pure URL construction; the provider is only
//! consulted for its URL format and credentials.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Coordinate;
use super::cache_access::AnalysisCache;
use super::ports::{CacheCategory, CacheKey, GeoGateway, MapType, StaticMapOptions};
use super::resolution::{Resolved, UpstreamCalls};

/// A named rendering of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageryView {
    pub label: String,
    pub options: StaticMapOptions,
}

impl ImageryView {
    /// Close satellite, neighbourhood road map, and wide hybrid context, in
    /// priority order.
    pub fn standard_views() -> Vec<Self> {
        let view = |label: &str, map_type, zoom| Self {
            label: label.to_owned(),
            options: StaticMapOptions {
                map_type,
                zoom,
                width: 640,
                height: 640,
                marker: true,
            },
        };
        vec![
            view("site_satellite", MapType::Satellite, 18),
            view("neighbourhood_roadmap", MapType::Roadmap, 15),
            view("regional_context", MapType::Hybrid, 12),
        ]
    }
}

/// Link to a rendered map image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageryReference {
    pub label: String,
    pub url: String,
    pub map_type: MapType,
    pub zoom: u8,
    pub width: u16,
    pub height: u16,
}

/// Builds the configured imagery views for a coordinate.
pub struct ImageryReferenceBuilder {
    gateway: Arc<dyn GeoGateway>,
    cache: AnalysisCache,
    views: Vec<ImageryView>,
}

impl ImageryReferenceBuilder {
    pub fn new(gateway: Arc<dyn GeoGateway>, cache: AnalysisCache, views: Vec<ImageryView>) -> Self {
        Self {
            gateway,
            cache,
            views,
        }
    }

    /// References for every view. Any URL failure yields an empty list.
    pub async fn build(&self, coordinate: Coordinate) -> Resolved<Vec<ImageryReference>> {
        let labels: Vec<&str> = self.views.iter().map(|view| view.label.as_str()).collect();
        let key = CacheKey::builder(CacheCategory::Imagery, coordinate.rounded())
            .param("views", labels.join(","))
            .build();
        if let Some(references) = self.cache.fetch(&key, CacheCategory::Imagery).await {
            return Resolved::cached(references);
        }

        let centre = coordinate.rounded();
        let mut references = Vec::with_capacity(self.views.len());
        for view in &self.views {
            match self.gateway.static_image_url(centre, &view.options) {
                Ok(url) => references.push(ImageryReference {
                    label: view.label.clone(),
                    url: url.to_string(),
                    map_type: view.options.map_type,
                    zoom: view.options.zoom,
                    width: view.options.width,
                    height: view.options.height,
                }),
                Err(error) => {
                    warn!(coordinate = %coordinate.key(), view = %view.label, %error, "imagery url construction failed");
                    return Resolved::fallback(Vec::new(), UpstreamCalls::NONE, error.to_string());
                }
            }
        }

        self.cache.store(&key, CacheCategory::Imagery, &references).await;
        let built = u32::try_from(references.len()).unwrap_or(u32::MAX);
        Resolved::fresh(references, UpstreamCalls::imagery(built))
    }
}

#[cfg(test)]
mod tests {
    //! View construction and cache reuse.

    use std::time::Duration;

    use super::*;
    use crate::domain::BranchStatus;
    use crate::domain::ports::{FixtureCacheStore, FixtureGeoGateway, GeoGatewayError, MockGeoGateway};
    use crate::domain::strategy::CacheTtls;

    fn here() -> Coordinate {
        Coordinate::new(6.9271, 79.8612).expect("valid")
    }

    fn cache() -> AnalysisCache {
        AnalysisCache::new(Arc::new(FixtureCacheStore), CacheTtls::default(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn builds_one_reference_per_view() {
        let builder = ImageryReferenceBuilder::new(
            Arc::new(FixtureGeoGateway),
            cache(),
            ImageryView::standard_views(),
        );
        let resolved = builder.build(here()).await;
        assert_eq!(resolved.status, BranchStatus::Fresh);
        assert_eq!(resolved.value.len(), 3);
        assert_eq!(resolved.calls, UpstreamCalls::imagery(3));
        assert_eq!(resolved.value[0].label, "site_satellite");
    }

    #[tokio::test]
    async fn url_failure_falls_back_to_empty() {
        let mut gateway = MockGeoGateway::new();
        gateway
            .expect_static_image_url()
            .returning(|_, _| Err(GeoGatewayError::invalid_request("missing key")));
        let builder =
            ImageryReferenceBuilder::new(Arc::new(gateway), cache(), ImageryView::standard_views());
        let resolved = builder.build(here()).await;
        assert_eq!(resolved.status, BranchStatus::Fallback);
        assert!(resolved.value.is_empty());
        assert!(resolved.error.is_some());
    }
}
