//! Street-level imagery provider
//!
//! The pipeline depends on two requests only: a metadata query for a location
//! and the image download for the same location. [`ImageryProvider`] is the
//! seam between the pipeline and the network; [`StreetViewClient`] implements
//! it over HTTP with `reqwest`.

use crate::config::AcquisitionConfig;
use crate::error::{Result, ScraperError};
use crate::sampler::SamplePoint;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Location block of a metadata response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Body of a metadata response
///
/// Only `status` is always present. Providers omit the remaining fields when
/// there is no imagery at the queried location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub status: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub pano_id: Option<String>,
    #[serde(default)]
    pub location: Option<LatLng>,
}

impl MetadataResponse {
    /// Status reported when imagery exists at the location
    pub const STATUS_OK: &'static str = "OK";
}

/// Remote source of imagery metadata and image bytes
#[async_trait]
pub trait ImageryProvider: Send + Sync {
    /// Query metadata for the location and heading of `point`
    ///
    /// # Errors
    /// - `Http` for a non-success status
    /// - `Network` for transport failures
    /// - `InvalidResponse` for a body that is not a metadata document
    async fn fetch_metadata(&self, point: &SamplePoint) -> Result<MetadataResponse>;

    /// Stream the image for `point` into `writer`, returning the bytes written
    ///
    /// # Errors
    /// - `Http` for a non-success status
    /// - `Network` if the body cannot be streamed into `writer`
    async fn download_image(
        &self,
        point: &SamplePoint,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;
}

/// HTTP client for the Street View Static API
#[derive(Clone)]
pub struct StreetViewClient {
    client: Client,
    base_url: String,
    api_key: String,
    size: String,
    fov: u16,
}

impl std::fmt::Debug for StreetViewClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreetViewClient")
            .field("base_url", &self.base_url)
            .field("size", &self.size)
            .field("fov", &self.fov)
            .finish_non_exhaustive()
    }
}

impl StreetViewClient {
    /// Create a client from a resolved configuration
    ///
    /// # Errors
    /// Returns `Network` if the HTTP client cannot be constructed
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScraperError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            size: config.image_size.to_string(),
            fov: config.fov,
        })
    }

    /// Metadata endpoint URL for a point
    #[must_use]
    pub fn metadata_url(&self, point: &SamplePoint) -> String {
        format!("{}/metadata?{}", self.base_url, self.query(point, &self.api_key))
    }

    /// Image endpoint URL for a point
    #[must_use]
    pub fn image_url(&self, point: &SamplePoint) -> String {
        format!("{}?{}", self.base_url, self.query(point, &self.api_key))
    }

    fn query(&self, point: &SamplePoint, key: &str) -> String {
        format!(
            "size={}&fov={}&location={},{}&heading={}&key={}",
            self.size, self.fov, point.latitude, point.longitude, point.heading, key
        )
    }

    /// URL safe to log or report: the key is replaced
    fn redacted(&self, url: &str) -> String {
        if self.api_key.is_empty() {
            return url.to_string();
        }
        url.replace(&format!("key={}", self.api_key), "key=<redacted>")
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await.map_err(|e| {
            ScraperError::network_error(
                format!("Request to {} failed", self.redacted(url)),
                e.without_url(),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Http {
                status: status.as_u16(),
                url: self.redacted(url),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ImageryProvider for StreetViewClient {
    async fn fetch_metadata(&self, point: &SamplePoint) -> Result<MetadataResponse> {
        let url = self.metadata_url(point);
        let response = self.get(&url).await?;

        let body = response.bytes().await.map_err(|e| {
            ScraperError::network_error("Failed to read metadata body", e.without_url())
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            ScraperError::invalid_response(format!("metadata for {point} is not valid JSON: {e}"))
        })
    }

    async fn download_image(
        &self,
        point: &SamplePoint,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let url = self.image_url(point);
        let response = self.get(&url).await?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.without_url())),
        );

        let written = tokio::io::copy(&mut stream, &mut *writer).await.map_err(|e| {
            ScraperError::network_error(format!("Failed to stream image for {point}"), e)
        })?;
        writer.flush().await?;

        tracing::trace!(bytes = written, point = %point, "Image downloaded");
        Ok(written)
    }
}
