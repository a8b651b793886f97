//! Region-keyed geometry cache
//!
//! Resolves a country to its region's road dataset. Datasets are loaded lazily,
//! at most once per region, and kept for the lifetime of the cache. Countries
//! that share a region share one load. Failed loads are not cached, so a later
//! call retries the source.

use crate::error::{Result, ScraperError};
use crate::geometry::{GeometrySource, RegionGeometrySet};
use crate::regions::CountryRegionIndex;
use crate::tracing_config::{events, spans};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

type RegionSlot = Arc<OnceCell<Arc<RegionGeometrySet>>>;

/// Geometry cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryCacheStats {
    /// Regions currently held in memory
    pub loaded_regions: usize,
    /// Successful source loads
    pub loads: u64,
    /// Resolutions served from memory
    pub cache_hits: u64,
    /// Resolutions that had to go to the source
    pub cache_misses: u64,
}

/// Country → region → geometry cache
pub struct GeometryCache {
    index: CountryRegionIndex,
    source: Arc<dyn GeometrySource>,
    regions: Mutex<HashMap<String, RegionSlot>>,
    loads: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for GeometryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryCache")
            .field("index", &self.index)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl GeometryCache {
    /// Create an empty cache over a country index and a geometry source
    pub fn new(index: CountryRegionIndex, source: Arc<dyn GeometrySource>) -> Self {
        Self {
            index,
            source,
            regions: Mutex::new(HashMap::new()),
            loads: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Country index backing this cache
    #[must_use]
    pub fn index(&self) -> &CountryRegionIndex {
        &self.index
    }

    /// Resolve a country to its region's geometry set
    ///
    /// # Errors
    /// - `UnknownCountry` if the country is not in the index
    /// - `GeometrySourceUnavailable` if the region dataset cannot be loaded
    pub async fn resolve(&self, country: &str) -> Result<Arc<RegionGeometrySet>> {
        let region = self.index.resolve(country)?.to_string();
        self.resolve_region(&region).await
    }

    /// Load (or fetch from memory) the geometry set of a region
    ///
    /// # Errors
    /// Returns `GeometrySourceUnavailable` if the region dataset cannot be loaded
    pub async fn resolve_region(&self, region: &str) -> Result<Arc<RegionGeometrySet>> {
        let slot = self.slot(region);

        if let Some(set) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            events::cache_hit(region);
            return Ok(Arc::clone(set));
        }

        let set = slot
            .get_or_try_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                events::cache_miss(region);
                let loaded = self.load_blocking(region).await?;
                self.loads.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Cached {} roads ({} usable) for {}",
                    loaded.len(),
                    loaded.usable_roads(),
                    region
                );
                Ok::<_, ScraperError>(Arc::new(loaded))
            })
            .await?;

        Ok(Arc::clone(set))
    }

    /// Whether a region's dataset is in memory
    #[must_use]
    pub fn is_loaded(&self, region: &str) -> bool {
        self.lock_regions()
            .get(region)
            .is_some_and(|slot| slot.initialized())
    }

    /// Names of regions held in memory, sorted
    #[must_use]
    pub fn loaded_regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self
            .lock_regions()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(region, _)| region.clone())
            .collect();
        regions.sort();
        regions
    }

    /// Snapshot of cache statistics
    #[must_use]
    pub fn stats(&self) -> GeometryCacheStats {
        GeometryCacheStats {
            loaded_regions: self.loaded_regions().len(),
            loads: self.loads.load(Ordering::Relaxed),
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, region: &str) -> RegionSlot {
        Arc::clone(self.lock_regions().entry(region.to_string()).or_default())
    }

    fn lock_regions(&self) -> std::sync::MutexGuard<'_, HashMap<String, RegionSlot>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn load_blocking(&self, region: &str) -> Result<RegionGeometrySet> {
        let source = Arc::clone(&self.source);
        let region_name = region.to_string();
        let span = spans::region_load(region);

        let loaded = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            source.load(&region_name)
        })
        .await
        .map_err(|e| ScraperError::geometry_unavailable(region, format!("loader task failed: {e}")))?;

        if let Err(e) = &loaded {
            log::error!("Failed to load geometry for {}: {}", region, e);
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RoadGeometry;
    use geo_types::{Coord, LineString};
    use std::sync::atomic::AtomicUsize;

    /// Source that counts loads and can be told to fail
    struct CountingSource {
        loads: AtomicUsize,
        failures_left: AtomicUsize,
    }

    impl CountingSource {
        fn new(failures: usize) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(failures),
            }
        }
    }

    impl GeometrySource for CountingSource {
        fn load(&self, region: &str) -> Result<RegionGeometrySet> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ScraperError::geometry_unavailable(region, "corrupt"));
            }
            let road: LineString<f64> = vec![Coord { x: 1.0, y: 2.0 }].into();
            Ok(RegionGeometrySet::new(region, vec![RoadGeometry::Line(road)]))
        }
    }

    fn index() -> CountryRegionIndex {
        CountryRegionIndex::from_regions(vec![
            ("Region 4", vec!["France", "Germany"]),
            ("Region 1", vec!["Canada"]),
        ])
    }

    #[tokio::test]
    async fn test_countries_in_same_region_share_one_load() {
        let source = Arc::new(CountingSource::new(0));
        let cache = GeometryCache::new(index(), source.clone());

        let france = cache.resolve("France").await.unwrap();
        let germany = cache.resolve("Germany").await.unwrap();
        let again = cache.resolve("France").await.unwrap();

        assert!(Arc::ptr_eq(&france, &germany));
        assert!(Arc::ptr_eq(&france, &again));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(cache.loaded_regions(), vec!["Region 4".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_country_does_not_touch_source() {
        let source = Arc::new(CountingSource::new(0));
        let cache = GeometryCache::new(index(), source.clone());

        let err = cache.resolve("Atlantis").await.unwrap_err();
        assert!(matches!(err, ScraperError::UnknownCountry(_)));
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let source = Arc::new(CountingSource::new(1));
        let cache = GeometryCache::new(index(), source.clone());

        let err = cache.resolve("Canada").await.unwrap_err();
        assert!(matches!(err, ScraperError::GeometrySourceUnavailable { .. }));
        assert!(!cache.is_loaded("Region 1"));

        let set = cache.resolve("Canada").await.unwrap();
        assert_eq!(set.region(), "Region 1");
        assert!(cache.is_loaded("Region 1"));
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_loads_once() {
        let source = Arc::new(CountingSource::new(0));
        let cache = Arc::new(GeometryCache::new(index(), source.clone()));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let country = if i % 2 == 0 { "France" } else { "Germany" };
                    cache.resolve(country).await.map(|set| set.len())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }
}
