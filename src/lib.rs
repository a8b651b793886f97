#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Street View Scraper
//!
//! Builds country-level street imagery datasets by sampling points on a
//! country's road network and downloading the street-level views available
//! at those points.
//!
//! An acquisition for one country runs in rounds. Each round samples unused
//! roads from the region's road geometry, validates every candidate against
//! the imagery provider's metadata endpoint, and downloads the images for
//! the points that have coverage. Rounds repeat until the country's image
//! quota is met or its roads run out.
//!
//! ## Features
//!
//! - **Road-network sampling**: candidate locations come from GRIP4 road
//!   shapefiles, so samples fall where street imagery can exist
//! - **Shared region geometry**: countries of the same region share one lazily
//!   loaded dataset
//! - **Metadata validation**: only locations with a real panorama are
//!   downloaded, and files are named after the panorama's own coordinates
//! - **Bounded concurrency and retries**: a fixed worker pool per round with
//!   backoff for transient provider errors
//! - **Metadata ledger**: one JSON record per downloaded image
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use streetview_scraper::{
//!     Acquirer, AcquisitionConfig, CountryRegionIndex, GeometryCache, MetadataLedger,
//!     ShapefileSource, StreetViewClient,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let index = CountryRegionIndex::from_path("regions.json")?;
//! let cache = Arc::new(GeometryCache::new(
//!     index,
//!     Arc::new(ShapefileSource::grip4("GRIP4")),
//! ));
//!
//! let config = AcquisitionConfig::builder()
//!     .api_key(std::env::var("MAPS_API_KEY")?)
//!     .workers(4)
//!     .build()?;
//! let provider = Arc::new(StreetViewClient::new(&config)?);
//!
//! let acquirer = Acquirer::new(cache, provider, config);
//! let mut ledger = MetadataLedger::new();
//! let report = acquirer
//!     .acquire("France", 10, Path::new("Downloads/France"), &mut ledger)
//!     .await?;
//!
//! println!("{} images ({})", report.successes, report.termination);
//! ledger.write_json("Downloads/metadata.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Library vs CLI Usage
//!
//! - **Library Usage**: sampling, validation, downloading and the ledger are available by default
//! - **CLI Usage**: the `cli` feature adds the command-line front end, progress bars and
//!   the tracing subscriber setup
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and progress reporting
//! - `tracing-json`: JSON structured log output
//! - `tracing-files`: log output to files through `tracing-appender`
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! streetview-scraper = { version = "0.2", default-features = false }
//! ```

pub mod acquisition;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod geometry;
pub mod metadata;
pub mod provider;
pub mod regions;
pub mod retry;
pub mod sampler;
pub mod services;
pub mod tracing_config;

// Public API exports
pub use acquisition::{Acquirer, AcquisitionReport, Termination};
pub use cache::{GeometryCache, GeometryCacheStats};
pub use config::{AcquisitionConfig, AcquisitionConfigBuilder, CaptureMode, ImageSize};
pub use download::{AcquisitionResult, ImageFetcher};
pub use error::{Result, ScraperError};
pub use geometry::{GeometrySource, RegionGeometrySet, RoadGeometry, ShapefileSource};
pub use metadata::{ImageMetadata, MetadataLedger, MetadataValidator, PanoramaMetadata};
pub use provider::{ImageryProvider, LatLng, MetadataResponse, StreetViewClient};
pub use regions::CountryRegionIndex;
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
pub use sampler::{Heading, PointSampler, SamplePoint};
pub use services::{ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};

pub use tracing_config::{events, spans, TracingConfig, TracingFormat, TracingGuard, TracingOutput};
