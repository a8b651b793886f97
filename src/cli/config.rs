//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliLogFormat};
use crate::config::{AcquisitionConfig, DEFAULT_WORKERS};
use crate::error::ScraperError;
use crate::tracing_config::{TracingConfig, TracingFormat};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::time::Duration;

/// Convert CLI arguments to an [`AcquisitionConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the acquisition configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<AcquisitionConfig> {
        let api_key = cli
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .context("API key is not set. Pass --api-key or set MAPS_API_KEY")?;

        let mut builder = AcquisitionConfig::builder().api_key(api_key);
        if let Some(workers) = cli.workers {
            builder = builder.workers(workers);
        }

        let config = builder
            .max_retries(cli.max_retries)
            .request_timeout(Duration::from_secs(cli.timeout))
            .capture_mode(cli.mode.into())
            .samples_per_country(cli.samples)
            .build()
            .context("Invalid configuration")?;

        Ok(config)
    }

    /// Countries to scrape, from `--country` flags then `--countries-file`
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub(crate) fn countries(cli: &Cli) -> Result<Vec<String>> {
        let mut countries: Vec<String> = cli
            .countries
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if let Some(path) = &cli.countries_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read countries file {}", path.display()))?;
            countries.extend(Self::parse_country_list(&content));
        }

        let mut seen = HashSet::new();
        countries.retain(|c| seen.insert(c.clone()));

        if countries.is_empty() {
            anyhow::bail!("No countries to scrape");
        }
        Ok(countries)
    }

    /// One country per line; blank lines and `#` comments are ignored
    pub(crate) fn parse_country_list(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Validate CLI arguments for consistency
    ///
    /// An explicit worker count is rejected rather than clamped when it
    /// exceeds the available parallelism. Without `--workers` the library
    /// default applies, which always fits.
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        let max_workers = AcquisitionConfig::max_workers();
        if let Some(workers) = cli.workers {
            if workers == 0 || workers > max_workers {
                return Err(ScraperError::config_value_error(
                    "workers",
                    workers,
                    &format!("1-{max_workers}"),
                    Some(DEFAULT_WORKERS.min(max_workers)),
                )
                .into());
            }
        }

        if cli.samples == 0 {
            anyhow::bail!("--samples must be at least 1");
        }

        if cli.max_retries == 0 {
            anyhow::bail!("--max-retries must be at least 1");
        }

        if cli.timeout == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }

        Ok(())
    }

    /// Logging setup from `-v`, `--log-format`, `--log-file` and `--log-filter`
    ///
    /// Formats and outputs that were compiled out are reported as errors
    /// instead of being ignored.
    pub(crate) fn tracing_config(cli: &Cli) -> Result<TracingConfig> {
        let format = match cli.log_format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
            #[cfg(not(feature = "tracing-json"))]
            CliLogFormat::Json => {
                anyhow::bail!("--log-format json needs the tracing-json feature")
            },
        };

        let mut config = TracingConfig::new()
            .with_verbosity(cli.verbose)
            .with_format(format)
            .with_session_id(uuid::Uuid::new_v4().to_string());

        if let Some(filter) = cli.log_filter.as_deref().map(str::trim) {
            if !filter.is_empty() {
                config = config.with_env_filter(filter);
            }
        }

        if let Some(path) = &cli.log_file {
            config = Self::with_log_file(config, path)?;
        }

        Ok(config)
    }

    #[cfg(feature = "tracing-files")]
    fn with_log_file(config: TracingConfig, path: &std::path::Path) -> Result<TracingConfig> {
        use crate::tracing_config::TracingOutput;

        Ok(config.with_output(TracingOutput::ConsoleAndFile(path.to_path_buf())))
    }

    #[cfg(not(feature = "tracing-files"))]
    fn with_log_file(_config: TracingConfig, path: &std::path::Path) -> Result<TracingConfig> {
        anyhow::bail!(
            "--log-file {} needs the tracing-files feature",
            path.display()
        )
    }
}
