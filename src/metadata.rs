//! Metadata validation and the acquisition ledger

use crate::error::{Result, ScraperError};
use crate::provider::{ImageryProvider, MetadataResponse};
use crate::sampler::{Heading, SamplePoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Canonical panorama data for a location with imagery
#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaMetadata {
    /// Capture date as reported by the provider (for example `2021-06`)
    pub date: Option<String>,
    pub pano_id: String,
    /// Latitude of the panorama, which may differ from the queried one
    pub latitude: f64,
    /// Longitude of the panorama, which may differ from the queried one
    pub longitude: f64,
}

impl PanoramaMetadata {
    /// Interpret a metadata response
    ///
    /// Returns `None` unless the status is `OK`, a non-empty panorama id is
    /// present and the response carries a location.
    #[must_use]
    pub fn from_response(response: MetadataResponse) -> Option<Self> {
        if response.status != MetadataResponse::STATUS_OK {
            return None;
        }

        let pano_id = response.pano_id.filter(|id| !id.trim().is_empty())?;
        let location = response.location?;

        Some(Self {
            date: response.date,
            pano_id,
            latitude: location.lat,
            longitude: location.lng,
        })
    }

    /// Image filename for this panorama at `heading`
    ///
    /// Coordinates keep a decimal point even when whole (`5.0_6.0_92.jpg`).
    #[must_use]
    pub fn filename(&self, heading: Heading) -> String {
        format!("{:?}_{:?}_{}.jpg", self.latitude, self.longitude, heading)
    }

    /// Ledger entry for an image saved under `filename`
    #[must_use]
    pub fn into_image_metadata(self, filename: String) -> ImageMetadata {
        ImageMetadata {
            capture_date: self.date,
            pano_id: self.pano_id,
            latitude: self.latitude,
            longitude: self.longitude,
            filename,
        }
    }
}

/// Checks whether a sample point has usable imagery
///
/// Every failure (transport, HTTP status, malformed body) is logged and
/// reported as "no imagery"; the validator never returns an error.
#[derive(Clone)]
pub struct MetadataValidator {
    provider: Arc<dyn ImageryProvider>,
}

impl MetadataValidator {
    pub fn new(provider: Arc<dyn ImageryProvider>) -> Self {
        Self { provider }
    }

    pub async fn validate(&self, point: &SamplePoint) -> Option<PanoramaMetadata> {
        let response = match self.provider.fetch_metadata(point).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(point = %point, error = %e, "Metadata query failed");
                return None;
            },
        };

        let status = response.status.clone();
        let metadata = PanoramaMetadata::from_response(response);
        if metadata.is_none() {
            tracing::debug!(point = %point, status = %status, "No usable imagery at location");
        }
        metadata
    }
}

/// One successfully acquired image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub capture_date: Option<String>,
    pub pano_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// File name relative to the country output directory
    pub filename: String,
}

/// Append-only record of acquired images
///
/// Entries are kept in the order results were aggregated, which is completion
/// order rather than request order.
#[derive(Debug, Clone, Default)]
pub struct MetadataLedger {
    entries: Vec<ImageMetadata>,
}

#[derive(Serialize)]
struct LedgerDocument<'a> {
    generated_at: DateTime<Utc>,
    count: usize,
    images: &'a [ImageMetadata],
}

impl MetadataLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ImageMetadata) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[ImageMetadata] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<ImageMetadata> {
        self.entries
    }

    /// Write the ledger as a JSON document
    ///
    /// # Errors
    /// - Serialization failure
    /// - File cannot be written
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let document = LedgerDocument {
            generated_at: Utc::now(),
            count: self.entries.len(),
            images: &self.entries,
        };

        let json = serde_json::to_string_pretty(&document).map_err(|e| {
            ScraperError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(path, json)
            .map_err(|e| ScraperError::file_io_error("write metadata ledger", path, &e))?;

        log::info!("Wrote {} ledger entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}

impl Extend<ImageMetadata> for MetadataLedger {
    fn extend<I: IntoIterator<Item = ImageMetadata>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LatLng;
    use async_trait::async_trait;
    use tokio::io::AsyncWrite;

    fn ok_response() -> MetadataResponse {
        MetadataResponse {
            status: "OK".to_string(),
            date: Some("2019-07".to_string()),
            pano_id: Some("pano-1".to_string()),
            location: Some(LatLng {
                lat: 48.8567,
                lng: 2.3523,
            }),
        }
    }

    struct FixedProvider(Result<MetadataResponse>);

    #[async_trait]
    impl ImageryProvider for FixedProvider {
        async fn fetch_metadata(&self, _point: &SamplePoint) -> Result<MetadataResponse> {
            match &self.0 {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(ScraperError::Network(e.to_string())),
            }
        }

        async fn download_image(
            &self,
            _point: &SamplePoint,
            _writer: &mut (dyn AsyncWrite + Unpin + Send),
        ) -> Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_ok_response_is_valid() {
        let metadata = PanoramaMetadata::from_response(ok_response()).unwrap();
        assert_eq!(metadata.pano_id, "pano-1");
        assert_eq!(metadata.date.as_deref(), Some("2019-07"));
        assert_eq!(metadata.filename(182), "48.8567_2.3523_182.jpg");
    }

    #[test]
    fn test_filename_keeps_decimal_point_for_whole_coordinates() {
        let metadata = PanoramaMetadata {
            date: None,
            pano_id: "pano-2".to_string(),
            latitude: 5.0,
            longitude: -6.0,
        };
        assert_eq!(metadata.filename(92), "5.0_-6.0_92.jpg");
    }

    #[test]
    fn test_invalid_responses() {
        let mut response = ok_response();
        response.status = "ZERO_RESULTS".to_string();
        assert!(PanoramaMetadata::from_response(response).is_none());

        let mut response = ok_response();
        response.pano_id = None;
        assert!(PanoramaMetadata::from_response(response).is_none());

        let mut response = ok_response();
        response.pano_id = Some("  ".to_string());
        assert!(PanoramaMetadata::from_response(response).is_none());

        let mut response = ok_response();
        response.location = None;
        assert!(PanoramaMetadata::from_response(response).is_none());
    }

    #[test]
    fn test_missing_date_is_allowed() {
        let mut response = ok_response();
        response.date = None;
        let metadata = PanoramaMetadata::from_response(response).unwrap();
        assert!(metadata.date.is_none());
    }

    #[tokio::test]
    async fn test_validator_swallows_transport_errors() {
        let validator = MetadataValidator::new(Arc::new(FixedProvider(Err(
            ScraperError::Network("connection refused".into()),
        ))));
        assert!(validator.validate(&SamplePoint::new(0.0, 0.0, 2)).await.is_none());
    }

    #[tokio::test]
    async fn test_validator_returns_canonical_location() {
        let validator = MetadataValidator::new(Arc::new(FixedProvider(Ok(ok_response()))));
        let metadata = validator
            .validate(&SamplePoint::new(48.8, 2.3, 92))
            .await
            .unwrap();
        assert!((metadata.latitude - 48.8567).abs() < f64::EPSILON);
        assert!((metadata.longitude - 2.3523).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ledger_write_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");

        let mut ledger = MetadataLedger::new();
        assert!(ledger.is_empty());
        let metadata = PanoramaMetadata::from_response(ok_response()).unwrap();
        let filename = metadata.filename(2);
        ledger.push(metadata.into_image_metadata(filename));
        ledger.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["images"][0]["pano_id"], "pano-1");
        assert_eq!(value["images"][0]["filename"], "48.8567_2.3523_2.jpg");
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn test_ledger_write_to_missing_directory_fails() {
        let err = MetadataLedger::new()
            .write_json("/nonexistent/dir/metadata.json")
            .unwrap_err();
        assert!(err.to_string().contains("write metadata ledger"));
    }
}
