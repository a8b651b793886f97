//! Candidate point generation from road geometry
//!
//! Every sampled road contributes one location (its first vertex) and one
//! [`SamplePoint`] per capture heading at that location.

pub use crate::config::CaptureMode;
use crate::geometry::RegionGeometrySet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Compass bearing of the camera in degrees
pub type Heading = u16;

/// A (latitude, longitude, heading) candidate for one fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Heading,
}

impl SamplePoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, heading: Heading) -> Self {
        Self {
            latitude,
            longitude,
            heading,
        }
    }
}

impl std::fmt::Display for SamplePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) @ {}°", self.latitude, self.longitude, self.heading)
    }
}

/// Draws sample points from one region's roads
///
/// The sampler remembers which roads it has already drawn, so successive calls
/// never reuse a road. Once every usable road is drawn it returns empty rounds.
pub struct PointSampler<'a, R = StdRng> {
    geometry: &'a RegionGeometrySet,
    mode: CaptureMode,
    unused: Vec<usize>,
    rng: R,
}

impl<'a> PointSampler<'a, StdRng> {
    /// Create a sampler seeded from system entropy
    #[must_use]
    pub fn new(geometry: &'a RegionGeometrySet, mode: CaptureMode) -> Self {
        Self::with_rng(geometry, mode, StdRng::from_entropy())
    }
}

impl<'a, R: Rng> PointSampler<'a, R> {
    /// Create a sampler with an explicit random source
    pub fn with_rng(geometry: &'a RegionGeometrySet, mode: CaptureMode, rng: R) -> Self {
        let unused = geometry
            .roads()
            .iter()
            .enumerate()
            .filter(|(_, road)| road.first_vertex().is_some())
            .map(|(i, _)| i)
            .collect();

        Self {
            geometry,
            mode,
            unused,
            rng,
        }
    }

    /// Usable roads not drawn yet
    #[must_use]
    pub fn remaining_roads(&self) -> usize {
        self.unused.len()
    }

    /// Draw one round of points for `point_budget` desired locations
    ///
    /// Selects `point_budget / 2` roads (at least one for a non-zero budget),
    /// uniformly at random without replacement when more roads are available
    /// than needed, otherwise every remaining road. An empty result means the
    /// geometry is exhausted.
    pub fn sample(&mut self, point_budget: usize) -> Vec<SamplePoint> {
        if point_budget == 0 || self.unused.is_empty() {
            return Vec::new();
        }

        let wanted = (point_budget / 2).max(1);
        let selected = if self.unused.len() > wanted {
            let mut picks = rand::seq::index::sample(&mut self.rng, self.unused.len(), wanted)
                .into_vec();
            // Highest position first keeps the remaining positions valid.
            picks.sort_unstable_by(|a, b| b.cmp(a));
            picks
                .into_iter()
                .map(|pos| self.unused.swap_remove(pos))
                .collect()
        } else {
            std::mem::take(&mut self.unused)
        };

        let headings = self.mode.headings();
        let mut points = Vec::with_capacity(selected.len() * headings.len());
        for road_index in selected {
            let Some(vertex) = self
                .geometry
                .roads()
                .get(road_index)
                .and_then(|road| road.first_vertex())
            else {
                continue;
            };

            points.extend(
                headings
                    .iter()
                    .map(|&heading| SamplePoint::new(vertex.y, vertex.x, heading)),
            );
        }

        tracing::trace!(
            region = %self.geometry.region(),
            point_budget,
            points = points.len(),
            remaining_roads = self.unused.len(),
            "Sampled round"
        );
        points
    }
}

/// Draw one independent round of panorama points from a geometry set
///
/// Convenience wrapper for callers that do not need draw memory across rounds.
#[must_use]
pub fn sample(geometry: &RegionGeometrySet, point_budget: usize) -> Vec<SamplePoint> {
    PointSampler::new(geometry, CaptureMode::Panorama).sample(point_budget)
}
