//! Road geometry datasets
//!
//! A region's roads are read from a file-backed vector dataset (GRIP4
//! shapefiles by default). Each road is kept as a single polyline, a
//! multi-polyline, or an opaque non-line shape that sampling skips.

use crate::error::{Result, ScraperError};
use geo_types::{Coord, LineString, MultiLineString};
use shapefile::Shape;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Number of regions in the GRIP4 global roads dataset
pub const GRIP4_REGION_COUNT: usize = 7;

/// One road record of a region dataset
#[derive(Debug, Clone, PartialEq)]
pub enum RoadGeometry {
    /// Single polyline
    Line(LineString<f64>),
    /// Polyline made of several parts
    MultiLine(MultiLineString<f64>),
    /// Any other shape type, named for diagnostics
    Other(&'static str),
}

impl RoadGeometry {
    /// First vertex of the road, or of its first part for multi-polylines
    ///
    /// Returns `None` for non-line shapes and empty lines. Coordinates follow
    /// the dataset convention: `x` is longitude, `y` is latitude.
    #[must_use]
    pub fn first_vertex(&self) -> Option<Coord<f64>> {
        match self {
            Self::Line(line) => line.0.first().copied(),
            Self::MultiLine(lines) => lines.0.first().and_then(|line| line.0.first().copied()),
            Self::Other(_) => None,
        }
    }

    /// Shape type name
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Line(_) => "LineString",
            Self::MultiLine(_) => "MultiLineString",
            Self::Other(kind) => kind,
        }
    }

    fn from_parts<P>(parts: &[Vec<P>], xy: impl Fn(&P) -> (f64, f64)) -> Self {
        let mut lines: Vec<LineString<f64>> = parts
            .iter()
            .map(|part| {
                part.iter()
                    .map(|p| {
                        let (x, y) = xy(p);
                        Coord { x, y }
                    })
                    .collect::<Vec<_>>()
                    .into()
            })
            .collect();

        match lines.len() {
            0 => Self::Other("EmptyPolyline"),
            1 => Self::Line(lines.remove(0)),
            _ => Self::MultiLine(MultiLineString(lines)),
        }
    }
}

impl From<Shape> for RoadGeometry {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Polyline(line) => Self::from_parts(line.parts(), |p| (p.x, p.y)),
            Shape::PolylineM(line) => Self::from_parts(line.parts(), |p| (p.x, p.y)),
            Shape::PolylineZ(line) => Self::from_parts(line.parts(), |p| (p.x, p.y)),
            Shape::NullShape => Self::Other("Null"),
            Shape::Point(_) | Shape::PointM(_) | Shape::PointZ(_) => Self::Other("Point"),
            Shape::Multipoint(_) | Shape::MultipointM(_) | Shape::MultipointZ(_) => {
                Self::Other("MultiPoint")
            },
            Shape::Polygon(_) | Shape::PolygonM(_) | Shape::PolygonZ(_) => Self::Other("Polygon"),
            Shape::Multipatch(_) => Self::Other("Multipatch"),
            #[allow(unreachable_patterns)]
            _ => Self::Other("Unknown"),
        }
    }
}

/// Immutable road dataset of one region
#[derive(Debug, Clone)]
pub struct RegionGeometrySet {
    region: String,
    roads: Vec<RoadGeometry>,
}

impl RegionGeometrySet {
    pub fn new<S: Into<String>>(region: S, roads: Vec<RoadGeometry>) -> Self {
        Self {
            region: region.into(),
            roads,
        }
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn roads(&self) -> &[RoadGeometry] {
        &self.roads
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    /// Count of roads that can yield a sample coordinate
    #[must_use]
    pub fn usable_roads(&self) -> usize {
        self.roads.iter().filter(|r| r.first_vertex().is_some()).count()
    }
}

/// Backing store that can load the geometry dataset of a region
///
/// Loading is blocking; callers run it off the async executor.
pub trait GeometrySource: Send + Sync {
    /// Load every road of `region`
    ///
    /// # Errors
    /// Returns `ScraperError::GeometrySourceUnavailable` when the dataset is
    /// missing, unreadable or corrupt
    fn load(&self, region: &str) -> Result<RegionGeometrySet>;
}

/// Shapefile-backed geometry source addressed by a region → path table
#[derive(Debug, Clone, Default)]
pub struct ShapefileSource {
    paths: HashMap<String, PathBuf>,
}

impl ShapefileSource {
    /// Create a source from an explicit region → shapefile table
    pub fn new<I, R, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = (R, P)>,
        R: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|(region, path)| (region.into(), path.into()))
                .collect(),
        }
    }

    /// Standard GRIP4 layout below `root`
    ///
    /// `Region n` maps to `{root}/GRIP4_Region{n}_vector_shp/GRIP4_region{n}.shp`.
    pub fn grip4<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self::new((1..=GRIP4_REGION_COUNT).map(|n| {
            (
                format!("Region {n}"),
                root.join(format!("GRIP4_Region{n}_vector_shp"))
                    .join(format!("GRIP4_region{n}.shp")),
            )
        }))
    }

    /// Shapefile configured for a region
    #[must_use]
    pub fn path_for(&self, region: &str) -> Option<&Path> {
        self.paths.get(region).map(PathBuf::as_path)
    }
}

impl GeometrySource for ShapefileSource {
    fn load(&self, region: &str) -> Result<RegionGeometrySet> {
        let path = self.path_for(region).ok_or_else(|| {
            ScraperError::geometry_unavailable(region, "no shapefile configured for region")
        })?;

        if !path.exists() {
            return Err(ScraperError::geometry_unavailable(
                region,
                format!("shapefile not found: {}", path.display()),
            ));
        }

        log::info!("Loading shapefile for {}: {}", region, path.display());
        let shapes = shapefile::read_shapes(path).map_err(|e| {
            ScraperError::geometry_unavailable(
                region,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;

        let roads: Vec<RoadGeometry> = shapes.into_iter().map(RoadGeometry::from).collect();
        log::debug!("Read {} road geometries for {}", roads.len(), region);

        Ok(RegionGeometrySet::new(region, roads))
    }
}
