//! Shared fixtures for the acquisition integration tests
//!
//! Road geometry and the imagery provider are replaced by in-memory doubles,
//! so the tests exercise the whole pipeline without network or shapefiles.

#![allow(dead_code)]

use async_trait::async_trait;
use geo_types::{Coord, LineString};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streetview_scraper::{
    Acquirer, AcquisitionConfig, CaptureMode, CountryRegionIndex, GeometryCache, GeometrySource,
    ImageryProvider, LatLng, MetadataResponse, RegionGeometrySet, Result, RoadGeometry,
    SamplePoint,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Bytes written for every downloaded image
pub const IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg";

/// Geometry source producing `roads` distinct single-vertex roads per region
///
/// Counts how often each region is loaded.
#[derive(Default)]
pub struct GridSource {
    roads: usize,
    loads: AtomicUsize,
}

impl GridSource {
    pub fn new(roads: usize) -> Self {
        Self {
            roads,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl GeometrySource for GridSource {
    fn load(&self, region: &str) -> Result<RegionGeometrySet> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let roads = (0..self.roads)
            .map(|i| {
                let x = 2.0 + (i % 100) as f64 * 0.01;
                let y = 46.0 + (i / 100) as f64 * 0.01;
                let line: LineString<f64> = vec![Coord { x, y }, Coord { x: x + 0.001, y }].into();
                RoadGeometry::Line(line)
            })
            .collect();
        Ok(RegionGeometrySet::new(region, roads))
    }
}

/// How the mock provider answers metadata queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every location has a panorama at the queried position
    Everywhere,
    /// No location has imagery
    Nowhere,
}

/// Imagery provider double
///
/// Tracks peak concurrency of downloads and can cancel a token after a fixed
/// number of downloads.
pub struct MockProvider {
    coverage: Coverage,
    download_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    downloads: AtomicUsize,
    metadata_calls: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    requested: Mutex<HashSet<String>>,
}

impl MockProvider {
    pub fn new(coverage: Coverage) -> Self {
        Self {
            coverage,
            download_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            cancel_after: Mutex::new(None),
            requested: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    pub fn cancel_after(self, downloads: usize, token: CancellationToken) -> Self {
        *self.cancel_after.lock().unwrap() = Some((downloads, token));
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    /// Distinct `lat,lon,heading` triples requested for download
    pub fn distinct_requests(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageryProvider for MockProvider {
    async fn fetch_metadata(&self, point: &SamplePoint) -> Result<MetadataResponse> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.coverage {
            Coverage::Everywhere => MetadataResponse {
                status: "OK".to_string(),
                date: Some("2021-06".to_string()),
                pano_id: Some(format!("pano-{:.5}-{:.5}", point.latitude, point.longitude)),
                location: Some(LatLng {
                    lat: point.latitude,
                    lng: point.longitude,
                }),
            },
            Coverage::Nowhere => MetadataResponse {
                status: "ZERO_RESULTS".to_string(),
                date: None,
                pano_id: None,
                location: None,
            },
        })
    }

    async fn download_image(
        &self,
        point: &SamplePoint,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.requested.lock().unwrap().insert(format!(
            "{},{},{}",
            point.latitude, point.longitude, point.heading
        ));

        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        writer.write_all(IMAGE_BYTES).await?;
        writer.flush().await?;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let done = self.downloads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if done >= *limit {
                token.cancel();
            }
        }
        Ok(IMAGE_BYTES.len() as u64)
    }
}

/// Region index used by every test: France and Spain share Region 4
pub fn region_index() -> CountryRegionIndex {
    CountryRegionIndex::from_regions(vec![
        ("Region 1", vec!["Canada", "United States"]),
        ("Region 4", vec!["France", "Spain", "Italy"]),
    ])
}

pub fn config(workers: usize, mode: CaptureMode) -> AcquisitionConfig {
    AcquisitionConfig::builder()
        .api_key("test-key")
        .workers(workers)
        .capture_mode(mode)
        .build()
        .unwrap()
}

/// Acquirer over a [`GridSource`] of `roads` roads and the given provider
pub fn acquirer(
    roads: usize,
    provider: Arc<MockProvider>,
    config: AcquisitionConfig,
) -> (Acquirer, Arc<GridSource>) {
    let source = Arc::new(GridSource::new(roads));
    let cache = Arc::new(GeometryCache::new(region_index(), source.clone()));
    (Acquirer::new(cache, provider, config), source)
}

/// Names of the regular files in `dir`
pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
