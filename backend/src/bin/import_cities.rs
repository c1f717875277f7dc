//! Import a city dataset into the city reference store.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use clap::Parser;
use geo_analysis::AnalysisSettings;
use geo_analysis::domain::ports::{CityRecord, CityStore};
use geo_analysis::domain::{Coordinate, OperatingBounds};
use geo_analysis::outbound::persistence::{
    DbPool, DieselCityStore, PoolConfig, run_pending_migrations,
};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const COUNTRY: &str = "Sri Lanka";
const TIMEZONE: &str = "Asia/Colombo";
const MAJOR_CITY_POPULATION: u64 = 100_000;
const MAJOR_CITIES: [&str; 21] = [
    "Colombo",
    "Kandy",
    "Galle",
    "Negombo",
    "Jaffna",
    "Trincomalee",
    "Batticaloa",
    "Ratnapura",
    "Anuradhapura",
    "Polonnaruwa",
    "Matara",
    "Hambantota",
    "Kurunegala",
    "Puttalam",
    "Badulla",
    "Bandarawela",
    "Nuwara Eliya",
    "Dambulla",
    "Sigiriya",
    "Vavuniya",
    "Mannar",
];

/// `import-cities` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "import-cities",
    about = "Upsert a JSON city dataset into the city reference table",
    version
)]
struct CliArgs {
    /// JSON array of `{name_en, latitude, longitude}` records.
    #[arg(long = "input", value_name = "path")]
    input: PathBuf,
    /// Database connection URL. Falls back to `GEO_ANALYSIS_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Parse and report without writing.
    #[arg(long)]
    dry_run: bool,
}

/// One record of the source dataset. Coordinates may be numbers or strings.
#[derive(Debug, Deserialize)]
struct SourceCity {
    name_en: Option<String>,
    #[serde(default)]
    latitude: Value,
    #[serde(default)]
    longitude: Value,
}

#[derive(Debug, Default)]
struct ImportPlan {
    records: Vec<CityRecord>,
    skipped: usize,
    outside_bounds: usize,
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Turn source records into city rows.
///
/// Records without a name or with zero or missing coordinates are skipped.
/// Records outside `bounds` are kept with a warning.
fn plan(source: Vec<SourceCity>, bounds: &OperatingBounds) -> ImportPlan {
    let majors: BTreeSet<&str> = MAJOR_CITIES.into_iter().collect();
    let mut plan = ImportPlan::default();
    for city in source {
        let name = city.name_en.as_deref().map(str::trim).unwrap_or_default();
        let latitude = number(&city.latitude).unwrap_or_default();
        let longitude = number(&city.longitude).unwrap_or_default();
        if name.is_empty() || latitude == 0.0 || longitude == 0.0 {
            warn!(city = name, "skipping record without a name or coordinates");
            plan.skipped += 1;
            continue;
        }
        let coordinate = match Coordinate::new(latitude, longitude) {
            Ok(coordinate) => coordinate,
            Err(error) => {
                warn!(city = name, %error, "skipping record with invalid coordinates");
                plan.skipped += 1;
                continue;
            }
        };
        if !bounds.contains(&coordinate) {
            warn!(city = name, coordinate = %coordinate.key(), "record lies outside the operating box");
            plan.outside_bounds += 1;
        }
        let is_major = majors.contains(name);
        plan.records.push(CityRecord {
            name: name.to_owned(),
            country: COUNTRY.to_owned(),
            state: None,
            coordinate,
            population: is_major.then_some(MAJOR_CITY_POPULATION),
            is_major,
            timezone: Some(TIMEZONE.to_owned()),
        });
    }
    plan
}

fn read_source(path: &Path) -> io::Result<Vec<SourceCity>> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "input path must be a file"))?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|error| {
        io::Error::other(format!("open input directory '{}': {error}", parent.display()))
    })?;
    let raw = directory.read_to_string(Path::new(file_name)).map_err(|error| {
        io::Error::other(format!("read input file '{}': {error}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("input must be a JSON array of cities: {error}"),
        )
    })
}

fn resolve_database_url(explicit: Option<String>, settings: &AnalysisSettings) -> io::Result<String> {
    explicit
        .or_else(|| settings.database_url.clone())
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "database URL missing: set --database-url or GEO_ANALYSIS_DATABASE_URL",
            )
        })
}

fn main() -> io::Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }

    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = AnalysisSettings::load_from_iter([OsString::from("import-cities")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let bounds = settings
        .bounds()
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;

    let source = read_source(&args.input)?;
    let total = source.len();
    let plan = plan(source, &bounds);
    info!(
        total,
        importable = plan.records.len(),
        skipped = plan.skipped,
        outside_bounds = plan.outside_bounds,
        "city dataset parsed"
    );
    if args.dry_run {
        println!("importable={}", plan.records.len());
        return Ok(());
    }

    let database_url = resolve_database_url(args.database_url, &settings)?;
    run_pending_migrations(&database_url)
        .await
        .map_err(|error| io::Error::other(error.to_string()))?;
    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    let written = DieselCityStore::new(pool)
        .upsert_cities(&plan.records)
        .await
        .map_err(|error| io::Error::other(format!("upsert cities: {error}")))?;

    println!("imported={written}");
    println!("skipped={}", plan.skipped);
    println!("outside_bounds={}", plan.outside_bounds);
    Ok(())
}
