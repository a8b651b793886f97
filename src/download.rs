//! Image fetching for validated sample points
//!
//! One fetch validates the point, creates the image file and streams the
//! image into it, under the bounded [`RetryPolicy`]. Failures never leave the
//! fetcher: they are logged and reported as an unsuccessful
//! [`AcquisitionResult`].

use crate::error::ScraperError;
use crate::metadata::{ImageMetadata, MetadataValidator};
use crate::provider::ImageryProvider;
use crate::retry::{Attempt, RetryOutcome, RetryPolicy};
use crate::sampler::SamplePoint;
use crate::tracing_config::{events, spans};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Result of fetching one sample point
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionResult {
    /// Present only when an image was written
    pub metadata: Option<ImageMetadata>,
}

impl AcquisitionResult {
    #[must_use]
    pub fn success(metadata: ImageMetadata) -> Self {
        Self {
            metadata: Some(metadata),
        }
    }

    #[must_use]
    pub fn failure() -> Self {
        Self { metadata: None }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.metadata.is_some()
    }

    /// Success flag as a tally increment (0 or 1)
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.is_success())
    }
}

/// Validates and downloads single sample points
#[derive(Clone)]
pub struct ImageFetcher {
    provider: Arc<dyn ImageryProvider>,
    validator: MetadataValidator,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl ImageFetcher {
    pub fn new(provider: Arc<dyn ImageryProvider>, policy: RetryPolicy) -> Self {
        Self {
            validator: MetadataValidator::new(Arc::clone(&provider)),
            provider,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop pending and future fetches when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch one point into `output_dir`
    ///
    /// Every attempt re-validates the point, so the filename always reflects
    /// the location reported by the latest metadata response. On success one
    /// file named `{lat}_{lon}_{heading}.jpg` exists in `output_dir`; on
    /// failure no file is left behind.
    pub async fn fetch(&self, point: &SamplePoint, output_dir: &Path) -> AcquisitionResult {
        let span = spans::fetch(point.latitude, point.longitude, point.heading);

        async {
            let outcome = self
                .policy
                .run(&self.cancel, |_| self.attempt(point, output_dir))
                .await;

            match outcome {
                RetryOutcome::Succeeded { value, attempts } => {
                    tracing::debug!(filename = %value.filename, attempts, "Image saved");
                    AcquisitionResult::success(value)
                },
                RetryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    let reason = last_error.map_or_else(
                        || "no imagery at location".to_string(),
                        |e| e.to_string(),
                    );
                    events::point_failed(point, attempts, &reason);
                    AcquisitionResult::failure()
                },
                RetryOutcome::Aborted {
                    error: ScraperError::Cancelled,
                    ..
                } => {
                    tracing::debug!(point = %point, "Fetch cancelled");
                    AcquisitionResult::failure()
                },
                RetryOutcome::Aborted { attempts, error } => {
                    events::point_failed(point, attempts, &error.to_string());
                    AcquisitionResult::failure()
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt(&self, point: &SamplePoint, output_dir: &Path) -> Attempt<ImageMetadata> {
        let Some(panorama) = self.validator.validate(point).await else {
            return Attempt::Skip;
        };

        let filename = panorama.filename(point.heading);
        let path = output_dir.join(&filename);

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Attempt::Abort(ScraperError::file_io_error(
                    "create image file (already acquired)",
                    &path,
                    &e,
                ));
            },
            Err(e) => {
                return Attempt::Abort(ScraperError::file_io_error("create image file", &path, &e))
            },
        };

        match self.provider.download_image(point, &mut file).await {
            Ok(bytes) => {
                tracing::trace!(bytes, path = %path.display(), "Image written");
                Attempt::Done(panorama.into_image_metadata(filename))
            },
            Err(e) => {
                drop(file);
                remove_partial(path).await;
                if e.is_transient() {
                    Attempt::Transient(e)
                } else {
                    Attempt::Abort(e)
                }
            },
        }
    }
}

async fn remove_partial(path: PathBuf) {
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != ErrorKind::NotFound {
            log::warn!("Failed to remove partial image {}: {}", path.display(), e);
        }
    }
}
