//! Per-country acquisition driver
//!
//! An acquisition repeats rounds of sample → concurrent fetch → tally until
//! the country's image quota is met, the sampler runs out of roads, or the
//! run is cancelled. Rounds never overlap: every fetch of a round completes
//! before the next round is sampled.

use crate::cache::GeometryCache;
use crate::config::AcquisitionConfig;
use crate::download::{AcquisitionResult, ImageFetcher};
use crate::error::{Result, ScraperError};
use crate::metadata::MetadataLedger;
use crate::provider::ImageryProvider;
use crate::retry::RetryPolicy;
use crate::sampler::{PointSampler, SamplePoint};
use crate::services::progress::{NoOpProgressReporter, ProgressReporter};
use crate::tracing_config::spans;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Why an acquisition stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The image quota was met
    QuotaReached,
    /// The sampler produced no further points before the quota was met
    Exhausted,
    /// The cancellation token fired
    Cancelled,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaReached => write!(f, "quota reached"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one country acquisition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionReport {
    pub country: String,
    pub region: String,
    /// Requested number of locations
    pub target: usize,
    /// Number of images that satisfies the target
    pub quota: usize,
    /// Images written
    pub successes: usize,
    /// Sample points dispatched
    pub attempted: usize,
    pub rounds: usize,
    pub termination: Termination,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl AcquisitionReport {
    #[must_use]
    pub fn quota_met(&self) -> bool {
        self.successes >= self.quota
    }
}

/// Drives acquisitions for any number of countries
///
/// The geometry cache and the provider are shared handles, so several
/// acquirers (or several concurrent acquisitions on one acquirer) reuse the
/// same loaded regions.
pub struct Acquirer {
    cache: Arc<GeometryCache>,
    fetcher: ImageFetcher,
    config: AcquisitionConfig,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Acquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Acquirer {
    pub fn new(
        cache: Arc<GeometryCache>,
        provider: Arc<dyn ImageryProvider>,
        config: AcquisitionConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let fetcher = ImageFetcher::new(provider, RetryPolicy::from_config(&config))
            .with_cancellation(cancel.clone());

        Self {
            cache,
            fetcher,
            config,
            progress: Arc::new(NoOpProgressReporter),
            cancel,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.fetcher = self.fetcher.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    /// Token that stops this acquirer's runs when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    /// Acquire images of `country` into `output_dir` until `target`
    /// locations' worth of images exist
    ///
    /// Successful images are appended to `ledger` in completion order.
    /// `output_dir` is created if missing. Point failures are absorbed; only
    /// country level failures are returned.
    ///
    /// # Errors
    /// - `UnknownCountry` if the country is not indexed
    /// - `GeometrySourceUnavailable` if its region cannot be loaded
    /// - `Io` if the output directory cannot be created
    pub async fn acquire(
        &self,
        country: &str,
        target: usize,
        output_dir: &Path,
        ledger: &mut MetadataLedger,
    ) -> Result<AcquisitionReport> {
        let quota = self.config.image_quota(target);
        let span = spans::country(country, target, quota);

        self.acquire_inner(country, target, quota, output_dir, ledger)
            .instrument(span)
            .await
    }

    async fn acquire_inner(
        &self,
        country: &str,
        target: usize,
        quota: usize,
        output_dir: &Path,
        ledger: &mut MetadataLedger,
    ) -> Result<AcquisitionReport> {
        let started = Instant::now();
        let geometry = self.cache.resolve(country).await?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ScraperError::file_io_error("create output directory", output_dir, &e))?;

        tracing::info!(
            region = %geometry.region(),
            roads = geometry.usable_roads(),
            output = %output_dir.display(),
            "Starting acquisition"
        );
        self.progress.on_country_start(country, quota);

        let views = self.config.capture_mode.views_per_location();
        let mut sampler = PointSampler::new(&geometry, self.config.capture_mode);
        let mut successes = 0;
        let mut attempted = 0;
        let mut rounds = 0;

        let termination = loop {
            if successes >= quota {
                break Termination::QuotaReached;
            }
            if self.cancel.is_cancelled() {
                break Termination::Cancelled;
            }

            let budget = target - successes / views;
            let mut points = sampler.sample(budget);
            if points.is_empty() {
                tracing::info!(successes, quota, "No more sample points");
                break Termination::Exhausted;
            }
            points.truncate(quota - successes);

            rounds += 1;
            attempted += points.len();
            self.progress.on_round_start(country, rounds, points.len());

            let round_successes = self
                .run_round(country, points, output_dir, ledger, successes, quota)
                .instrument(spans::round(rounds, budget))
                .await;
            successes += round_successes;
        };

        let report = AcquisitionReport {
            country: country.to_string(),
            region: geometry.region().to_string(),
            target,
            quota,
            successes,
            attempted,
            rounds,
            termination,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            successes,
            quota,
            rounds,
            termination = %termination,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Acquisition finished"
        );
        self.progress.on_country_complete(&report);
        Ok(report)
    }

    /// Fetch every point concurrently and collect all results
    ///
    /// Returns exactly one result per point, in completion order. At most
    /// `workers` fetches are in flight at once.
    pub async fn dispatch(
        &self,
        points: Vec<SamplePoint>,
        output_dir: &Path,
    ) -> Vec<AcquisitionResult> {
        self.results(points, output_dir).collect().await
    }

    async fn run_round(
        &self,
        country: &str,
        points: Vec<SamplePoint>,
        output_dir: &Path,
        ledger: &mut MetadataLedger,
        successes_before: usize,
        quota: usize,
    ) -> usize {
        let dispatched = points.len();
        let mut round_successes = 0;
        let mut results = std::pin::pin!(self.results(points, output_dir));

        while let Some(result) = results.next().await {
            let success = result.is_success();
            if let Some(metadata) = result.metadata {
                ledger.push(metadata);
                round_successes += 1;
            }
            self.progress
                .on_point_complete(country, success, successes_before + round_successes, quota);
        }

        tracing::debug!(dispatched, round_successes, "Round complete");
        round_successes
    }

    fn results<'a>(
        &'a self,
        points: Vec<SamplePoint>,
        output_dir: &'a Path,
    ) -> impl Stream<Item = AcquisitionResult> + 'a {
        stream::iter(points)
            .map(move |point| async move { self.fetcher.fetch(&point, output_dir).await })
            .buffer_unordered(self.config.workers.max(1))
    }
}
