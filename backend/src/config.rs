//! Service settings loaded via OrthoConfig.
//!
//! Call limits carry OrthoConfig defaults; every other field is optional and
//! its accessor falls back to the default documented on the field. [`AnalysisSettings::service_config`] validates the whole
//! set once at startup.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{
    AnalysisStrategy, Error, NearbyCityConfig, OperatingBounds, RateTable, SiteAnalysisConfig,
    StrategyKind,
};

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_CONCURRENT_CALLS: usize = 8;
const DEFAULT_BUDGET_CEILING: f64 = 0.50;

/// Settings for the analysis service and its adapters.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GEO_ANALYSIS")]
pub struct AnalysisSettings {
    /// `cost_minimizing`, `balanced` (default), or `comprehensive`.
    pub strategy: Option<String>,
    /// Operating box; defaults to Sri Lanka.
    pub min_latitude: Option<f64>,
    pub max_latitude: Option<f64>,
    pub min_longitude: Option<f64>,
    pub max_longitude: Option<f64>,
    /// Bound on each external call, in milliseconds.
    #[ortho_config(default = 5_000)]
    pub upstream_timeout_ms: u64,
    /// Provider calls in flight at once.
    #[ortho_config(default = 8)]
    pub max_concurrent_calls: usize,
    /// Nearby-city search radius in kilometres (default 50).
    pub nearby_radius_km: Option<f64>,
    /// Nearby cities returned (default 5).
    pub nearby_limit: Option<usize>,
    /// Spend per analysis above which an advisory is attached (default 0.50).
    pub budget_ceiling: Option<f64>,
    pub rate_geocode: Option<f64>,
    pub rate_poi_group: Option<f64>,
    pub rate_route: Option<f64>,
    pub rate_imagery: Option<f64>,
    /// Google Maps Platform key; without it an offline gateway is used.
    pub api_key: Option<String>,
    /// PostgreSQL URL; without it cities and bundles live in memory.
    pub database_url: Option<String>,
    /// Redis URL; without it the cache lives in memory.
    pub redis_url: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            strategy: None,
            min_latitude: None,
            max_latitude: None,
            min_longitude: None,
            max_longitude: None,
            upstream_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            nearby_radius_km: None,
            nearby_limit: None,
            budget_ceiling: None,
            rate_geocode: None,
            rate_poi_group: None,
            rate_route: None,
            rate_imagery: None,
            api_key: None,
            database_url: None,
            redis_url: None,
        }
    }
}

impl AnalysisSettings {
    /// Strategy preset, parsed.
    pub fn strategy_kind(&self) -> Result<StrategyKind, Error> {
        self.strategy
            .as_deref()
            .map_or(Ok(StrategyKind::default()), str::parse)
            .map_err(|err| Error::invalid_input(format!("strategy: {err}")))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    pub fn budget_ceiling(&self) -> f64 {
        self.budget_ceiling.unwrap_or(DEFAULT_BUDGET_CEILING)
    }

    /// Operating box, validated.
    pub fn bounds(&self) -> Result<OperatingBounds, Error> {
        let fallback = OperatingBounds::sri_lanka();
        match (
            self.min_latitude,
            self.max_latitude,
            self.min_longitude,
            self.max_longitude,
        ) {
            (None, None, None, None) => Ok(fallback),
            (min_lat, max_lat, min_lon, max_lon) => OperatingBounds::new(
                min_lat.unwrap_or(fallback.min_latitude()),
                max_lat.unwrap_or(fallback.max_latitude()),
                min_lon.unwrap_or(fallback.min_longitude()),
                max_lon.unwrap_or(fallback.max_longitude()),
            )
            .map_err(|err| Error::invalid_input(format!("operating bounds: {err}"))),
        }
    }

    /// Per-call rates, defaults filled in.
    pub fn rates(&self) -> RateTable {
        let defaults = RateTable::default();
        RateTable {
            geocode: self.rate_geocode.unwrap_or(defaults.geocode),
            poi_group: self.rate_poi_group.unwrap_or(defaults.poi_group),
            route: self.rate_route.unwrap_or(defaults.route),
            imagery: self.rate_imagery.unwrap_or(defaults.imagery),
        }
    }

    pub fn nearby(&self) -> NearbyCityConfig {
        let defaults = NearbyCityConfig::default();
        NearbyCityConfig {
            radius_km: self.nearby_radius_km.unwrap_or(defaults.radius_km),
            limit: self.nearby_limit.unwrap_or(defaults.limit),
        }
    }

    /// Provider key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }

    /// Validate everything and build the service configuration.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::InvalidInput`](crate::domain::ErrorCode::InvalidInput)
    /// naming the first offending setting.
    pub fn service_config(&self) -> Result<SiteAnalysisConfig, Error> {
        let strategy = AnalysisStrategy::preset(self.strategy_kind()?);
        let bounds = self.bounds()?;
        if self.upstream_timeout().is_zero() {
            return Err(Error::invalid_input("upstream_timeout_ms must be positive"));
        }
        if self.max_concurrent_calls() == 0 {
            return Err(Error::invalid_input("max_concurrent_calls must be at least 1"));
        }
        let nearby = self.nearby();
        if !(nearby.radius_km.is_finite() && nearby.radius_km > 0.0) {
            return Err(Error::invalid_input("nearby_radius_km must be positive"));
        }
        if nearby.limit == 0 {
            return Err(Error::invalid_input("nearby_limit must be at least 1"));
        }
        let rates = self.rates();
        rates
            .validate()
            .map_err(|err| Error::invalid_input(format!("rates: {err}")))?;
        let budget_ceiling = self.budget_ceiling();
        if !(budget_ceiling.is_finite() && budget_ceiling >= 0.0) {
            return Err(Error::invalid_input("budget_ceiling must be a non-negative number"));
        }

        Ok(SiteAnalysisConfig {
            strategy,
            bounds,
            call_timeout: self.upstream_timeout(),
            max_concurrent_calls: self.max_concurrent_calls(),
            nearby,
            rates,
            budget_ceiling,
        })
    }
}
