//! Configuration types for acquisition runs
//!
//! The front end resolves every setting once and hands the pipeline an
//! immutable [`AcquisitionConfig`]. Nothing inside the pipeline mutates it.

use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Street View Static API endpoint
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

/// Default size of the fetch worker pool
pub const DEFAULT_WORKERS: usize = 5;

/// Largest image edge accepted by the provider
pub const MAX_IMAGE_EDGE: u32 = 640;

/// Widest horizontal field of view accepted by the provider
pub const MAX_FOV: u16 = 120;

/// What to capture at each sampled location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Four views per location, one per cardinal heading
    Panorama,
    /// One north-facing view per location
    Single,
}

impl Default for CaptureMode {
    fn default() -> Self {
        Self::Panorama
    }
}

impl CaptureMode {
    /// Camera headings emitted for every location, in degrees
    #[must_use]
    pub fn headings(self) -> &'static [u16] {
        match self {
            Self::Panorama => &[2, 92, 182, 272],
            Self::Single => &[2],
        }
    }

    /// Number of images a fully successful location yields
    #[must_use]
    pub fn views_per_location(self) -> usize {
        self.headings().len()
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Panorama => write!(f, "panorama"),
            Self::Single => write!(f, "single"),
        }
    }
}

/// Requested image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: MAX_IMAGE_EDGE,
            height: MAX_IMAGE_EDGE,
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resolved settings for one or more country acquisitions
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Provider API key (never serialized)
    #[serde(skip)]
    pub api_key: String,

    /// Provider endpoint; the metadata endpoint is `{base_url}/metadata`
    pub base_url: String,

    /// Requested image size
    pub image_size: ImageSize,

    /// Horizontal field of view in degrees
    pub fov: u16,

    /// Number of concurrent fetch workers
    pub workers: usize,

    /// Attempts per sample point, including the first one
    pub max_retries: u32,

    /// Fixed delay after a transient HTTP failure
    #[serde(with = "duration_secs")]
    pub retry_backoff: Duration,

    /// Per-request network timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Views captured per location
    pub capture_mode: CaptureMode,

    /// Target number of locations per country
    pub samples_per_country: usize,
}

impl std::fmt::Debug for AcquisitionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("image_size", &self.image_size)
            .field("fov", &self.fov)
            .field("workers", &self.workers)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("request_timeout", &self.request_timeout)
            .field("capture_mode", &self.capture_mode)
            .field("samples_per_country", &self.samples_per_country)
            .finish()
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_size: ImageSize::default(),
            fov: MAX_FOV,
            workers: DEFAULT_WORKERS.min(Self::max_workers()),
            max_retries: 3,
            retry_backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            capture_mode: CaptureMode::Panorama,
            samples_per_country: 400,
        }
    }
}

impl AcquisitionConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> AcquisitionConfigBuilder {
        AcquisitionConfigBuilder::new()
    }

    /// Upper bound for the worker count on this machine
    #[must_use]
    pub fn max_workers() -> usize {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Missing API key
    /// - Worker count outside `1..=available_parallelism`
    /// - Zero retries, zero samples, or out of range image size / field of view
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ScraperError::invalid_config(
                "API key is not set. Pass --api-key or set MAPS_API_KEY",
            ));
        }

        let max_workers = Self::max_workers();
        if self.workers == 0 || self.workers > max_workers {
            return Err(ScraperError::config_value_error(
                "workers",
                self.workers,
                &format!("1-{max_workers}"),
                Some(DEFAULT_WORKERS.min(max_workers)),
            ));
        }

        if self.max_retries == 0 {
            return Err(ScraperError::config_value_error(
                "max_retries",
                self.max_retries,
                "1 or more",
                Some(3),
            ));
        }

        if self.fov == 0 || self.fov > MAX_FOV {
            return Err(ScraperError::config_value_error(
                "fov",
                self.fov,
                "1-120",
                Some(MAX_FOV),
            ));
        }

        let ImageSize { width, height } = self.image_size;
        if width == 0 || height == 0 || width > MAX_IMAGE_EDGE || height > MAX_IMAGE_EDGE {
            return Err(ScraperError::invalid_config(format!(
                "Invalid image size: {} (each edge must be 1-{})",
                self.image_size, MAX_IMAGE_EDGE
            )));
        }

        if self.samples_per_country == 0 {
            return Err(ScraperError::config_value_error(
                "samples_per_country",
                self.samples_per_country,
                "1 or more",
                Some(400),
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(ScraperError::invalid_config("Provider base URL is empty"));
        }

        Ok(())
    }

    /// Number of images that satisfies the quota for `target_locations`
    ///
    /// Saturates at `usize::MAX` instead of overflowing.
    #[must_use]
    pub fn image_quota(&self, target_locations: usize) -> usize {
        target_locations.saturating_mul(self.capture_mode.views_per_location())
    }
}

/// Builder for [`AcquisitionConfig`]
#[derive(Debug, Default)]
pub struct AcquisitionConfigBuilder {
    config: AcquisitionConfig,
}

impl AcquisitionConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AcquisitionConfig::default(),
        }
    }

    #[must_use]
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.api_key = key.into();
        self
    }

    #[must_use]
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.config.image_size = ImageSize { width, height };
        self
    }

    #[must_use]
    pub fn fov(mut self, fov: u16) -> Self {
        self.config.fov = fov;
        self
    }

    /// Set the worker count, clamped to `1..=available_parallelism`
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.clamp(1, AcquisitionConfig::max_workers());
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn capture_mode(mut self, mode: CaptureMode) -> Self {
        self.config.capture_mode = mode;
        self
    }

    #[must_use]
    pub fn samples_per_country(mut self, samples: usize) -> Self {
        self.config.samples_per_country = samples;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns `ScraperError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<AcquisitionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
