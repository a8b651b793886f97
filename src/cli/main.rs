//! Street View scraper CLI
//!
//! Non-interactive front end: resolves flags into an [`AcquisitionConfig`],
//! then acquires one country or a batch of countries.

use super::config::CliConfigBuilder;
use crate::{
    acquisition::{Acquirer, AcquisitionReport},
    cache::GeometryCache,
    config::CaptureMode,
    geometry::ShapefileSource,
    metadata::MetadataLedger,
    provider::StreetViewClient,
    regions::CountryRegionIndex,
    services::create_cli_progress_reporter,
};
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Name of the ledger written to the output root
pub const LEDGER_FILE_NAME: &str = "metadata.json";

/// Street-level imagery scraper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "streetview-scraper")]
#[command(group(
    ArgGroup::new("country_input")
        .required(true)
        .multiple(true)
        .args(["countries", "countries_file"])
))]
pub struct Cli {
    /// Country to scrape (repeat for a batch)
    #[arg(short = 'c', long = "country", value_name = "NAME")]
    pub countries: Vec<String>,

    /// File with one country name per line (batch mode)
    #[arg(long, value_name = "FILE")]
    pub countries_file: Option<PathBuf>,

    /// JSON document mapping region names to country lists
    #[arg(long, value_name = "FILE")]
    pub regions: PathBuf,

    /// Root of the GRIP4 road shapefiles
    #[arg(long, value_name = "DIR")]
    pub geometry_dir: PathBuf,

    /// Locations to sample per country
    #[arg(short = 'n', long, default_value_t = 400)]
    pub samples: usize,

    /// Output root; each country gets its own subdirectory
    #[arg(short, long, value_name = "DIR", default_value = "./Downloads")]
    pub output: PathBuf,

    /// Concurrent fetch workers [default: 5, capped at the CPU count]
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Views captured per location
    #[arg(long, value_enum, default_value_t = CliCaptureMode::Panorama)]
    pub mode: CliCaptureMode,

    /// Attempts per sample point
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Street View Static API key
    #[arg(long, env = "MAPS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Also write logs to this file (requires the tracing-files feature)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Filter directives overriding -v (for example `streetview_scraper=debug`)
    #[arg(long, env = "RUST_LOG", value_name = "DIRECTIVES")]
    pub log_filter: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliCaptureMode {
    /// Four cardinal views per location
    Panorama,
    /// One view per location
    Single,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    /// Colored human-readable lines
    Console,
    /// Plain lines without colors
    Compact,
    /// JSON objects (requires the tracing-json feature)
    Json,
}

impl From<CliCaptureMode> for CaptureMode {
    fn from(mode: CliCaptureMode) -> Self {
        match mode {
            CliCaptureMode::Panorama => Self::Panorama,
            CliCaptureMode::Single => Self::Single,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracing = CliConfigBuilder::tracing_config(&cli)
        .context("Invalid logging options")?
        .init()
        .context("Failed to initialize tracing")?;
    tracing::debug!(verbosity = cli.verbose, "Tracing initialized");

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let countries = CliConfigBuilder::countries(&cli).context("Failed to resolve countries")?;
    let batch = cli.countries_file.is_some() || countries.len() > 1;

    info!(
        "Scraping {} countr{} ({} mode, {} locations each, {} workers)",
        countries.len(),
        if countries.len() == 1 { "y" } else { "ies" },
        config.capture_mode,
        config.samples_per_country,
        config.workers
    );

    let index = CountryRegionIndex::from_path(&cli.regions)
        .context("Failed to load country/region index")?;
    let cache = Arc::new(GeometryCache::new(
        index,
        Arc::new(ShapefileSource::grip4(&cli.geometry_dir)),
    ));
    let provider =
        Arc::new(StreetViewClient::new(&config).context("Failed to create imagery client")?);

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let samples = config.samples_per_country;
    let acquirer = Acquirer::new(cache, provider, config)
        .with_progress(create_cli_progress_reporter(cli.verbose == 0, cli.verbose > 0))
        .with_cancellation(cancel.clone());

    let start_time = Instant::now();
    let mut ledger = MetadataLedger::new();
    let mut reports: Vec<AcquisitionReport> = Vec::new();
    let mut failed = 0;

    for country in &countries {
        if cancel.is_cancelled() {
            warn!("Cancelled; skipping remaining countries");
            break;
        }

        let output_dir = cli.output.join(country);
        match acquirer
            .acquire(country, samples, &output_dir, &mut ledger)
            .await
        {
            Ok(report) => reports.push(report),
            Err(e) if batch => {
                error!("Skipping {}: {}", country, e);
                failed += 1;
            },
            Err(e) => {
                write_ledger(&cli.output, &ledger)?;
                return Err(e).with_context(|| format!("Failed to acquire images for {country}"));
            },
        }
    }

    write_ledger(&cli.output, &ledger)?;

    let images: usize = reports.iter().map(|r| r.successes).sum();
    info!(
        "Downloaded {} image(s) from {} countr{} in {:.2}s",
        images,
        reports.len(),
        if reports.len() == 1 { "y" } else { "ies" },
        start_time.elapsed().as_secs_f64()
    );
    for report in reports.iter().filter(|r| !r.quota_met()) {
        warn!(
            "{}: {}/{} images ({})",
            report.country, report.successes, report.quota, report.termination
        );
    }
    if failed > 0 {
        warn!("{} countr{} failed", failed, if failed == 1 { "y" } else { "ies" });
    }

    Ok(())
}

fn write_ledger(output_root: &Path, ledger: &MetadataLedger) -> Result<()> {
    if ledger.is_empty() {
        return Ok(());
    }

    std::fs::create_dir_all(output_root)
        .with_context(|| format!("Failed to create {}", output_root.display()))?;
    ledger
        .write_json(output_root.join(LEDGER_FILE_NAME))
        .context("Failed to write metadata ledger")
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight requests");
            cancel.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "streetview-scraper",
            "-c",
            "France",
            "--regions",
            "regions.json",
            "--geometry-dir",
            "GRIP4",
        ])
        .unwrap();

        assert_eq!(cli.countries, vec!["France".to_string()]);
        assert_eq!(cli.samples, 400);
        assert_eq!(cli.output, PathBuf::from("./Downloads"));
        assert_eq!(cli.workers, None);
        assert_eq!(cli.log_format, CliLogFormat::Console);
        assert!(cli.log_file.is_none());
        assert_eq!(cli.mode, CliCaptureMode::Panorama);
        assert_eq!(cli.max_retries, 3);
        assert_eq!(cli.timeout, 30);
    }

    #[test]
    fn test_country_input_is_required() {
        let result = Cli::try_parse_from([
            "streetview-scraper",
            "--regions",
            "regions.json",
            "--geometry-dir",
            "GRIP4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_flags() {
        let cli = Cli::try_parse_from([
            "streetview-scraper",
            "-c",
            "France",
            "--country",
            "Spain",
            "--mode",
            "single",
            "-vv",
            "--regions",
            "regions.json",
            "--geometry-dir",
            "GRIP4",
        ])
        .unwrap();

        assert_eq!(cli.countries.len(), 2);
        assert!(cli.workers.is_none());
        assert_eq!(CaptureMode::from(cli.mode), CaptureMode::Single);
        assert_eq!(cli.verbose, 2);
    }
}
