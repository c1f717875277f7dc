//! `geo-analysis`: analyse one site and print the bundle as JSON.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::Parser;
use geo_analysis::AnalysisSettings;
use geo_analysis::domain::ports::{
    AnalysisBundleRepository, CacheStore, CityStore, FixtureGeoGateway, GeoGateway,
};
use geo_analysis::domain::{AnalysisRequestInput, SiteAnalysisPorts, SiteAnalysisService};
use geo_analysis::outbound::cache::{InMemoryCacheStore, RedisCacheStore, TtlJitter};
use geo_analysis::outbound::google::GoogleMapsGateway;
use geo_analysis::outbound::memory::{InMemoryBundleRepository, InMemoryCityStore};
use geo_analysis::outbound::persistence::{
    DbPool, DieselAnalysisBundleRepository, DieselCityStore, PoolConfig, run_pending_migrations,
};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `geo-analysis` command arguments. Service settings come from the
/// environment and configuration files instead.
#[derive(Debug, Clone, Parser)]
#[command(name = "geo-analysis", about = "Analyse a site and print its bundle", version)]
struct CliArgs {
    /// Site latitude in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    /// Site longitude in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
    /// Facility search radius in metres.
    #[arg(long, default_value_t = 5_000)]
    radius: u32,
    /// Facility category; repeat for several. Defaults to the strategy's set.
    #[arg(long = "category", value_name = "name")]
    categories: Vec<String>,
    /// `drive`, `walk`, `transit`, or `bicycle`.
    #[arg(long)]
    mode: Option<String>,
}

impl CliArgs {
    fn request(&self) -> AnalysisRequestInput {
        let input = AnalysisRequestInput::at(self.lat, self.lon)
            .with_radius(self.radius)
            .with_categories(self.categories.iter().cloned());
        match &self.mode {
            Some(mode) => input.with_travel_mode(mode.clone()),
            None => input,
        }
    }
}

fn main() -> io::Result<()> {
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }

    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = AnalysisSettings::load_from_iter([OsString::from("geo-analysis")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let config = settings
        .service_config()
        .map_err(|error| io::Error::other(format!("invalid settings: {error}")))?;

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
    let ports = build_ports(&settings, &clock, config.call_timeout).await?;
    let service = SiteAnalysisService::new(ports, clock, config)
        .map_err(|error| io::Error::other(format!("build service: {error}")))?;

    let bundle = service
        .analyse(&args.request())
        .await
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
    let rendered = serde_json::to_string_pretty(&bundle).map_err(io::Error::other)?;
    println!("{rendered}");
    Ok(())
}

async fn build_ports(
    settings: &AnalysisSettings,
    clock: &Arc<dyn Clock + Send + Sync>,
    timeout: std::time::Duration,
) -> io::Result<SiteAnalysisPorts> {
    let gateway: Arc<dyn GeoGateway> = match settings.api_key() {
        Some(key) => Arc::new(
            GoogleMapsGateway::new(key, timeout)
                .map_err(|error| io::Error::other(format!("build provider client: {error}")))?,
        ),
        None => {
            warn!("no provider API key configured; using the offline gateway");
            Arc::new(FixtureGeoGateway)
        }
    };

    let cache: Arc<dyn CacheStore> = match settings.redis_url.as_deref() {
        Some(url) => Arc::new(
            RedisCacheStore::connect(url, Arc::clone(clock), TtlJitter::default())
                .await
                .map_err(|error| io::Error::other(format!("connect cache: {error}")))?,
        ),
        None => {
            info!("no redis URL configured; caching in process");
            Arc::new(InMemoryCacheStore::new(Arc::clone(clock)))
        }
    };

    let (city_store, repository): (Arc<dyn CityStore>, Arc<dyn AnalysisBundleRepository>) =
        match settings.database_url.as_deref() {
            Some(url) => {
                run_pending_migrations(url)
                    .await
                    .map_err(|error| io::Error::other(error.to_string()))?;
                let pool = DbPool::new(PoolConfig::new(url).with_connection_timeout(timeout))
                    .await
                    .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
                (
                    Arc::new(DieselCityStore::new(pool.clone())),
                    Arc::new(DieselAnalysisBundleRepository::new(pool)),
                )
            }
            None => {
                info!("no database URL configured; cities and bundles live in memory");
                (
                    Arc::new(InMemoryCityStore::scan_only()),
                    Arc::new(InMemoryBundleRepository::new()),
                )
            }
        };

    Ok(SiteAnalysisPorts {
        gateway,
        cache,
        city_store,
        repository,
    })
}
