use crate::core::{config::EngineConfig, geo::TileCoord};
use crate::data::{shapefile::ShapefileSource, source::FeatureSource};
use crate::spatial::{index::FeatureIndex, intersect};
use crate::tiles::{cache::TileCache, encoder};
use crate::{EngineError, Result};
use fxhash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Externally observable lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Closed,
    Opening,
    Open,
    Failed,
}

/// Everything published at the `Opening -> Open` transition: the immutable
/// index (which owns the feature set) and the source metadata. Shared by
/// reference with in-flight tile loads, so a concurrent close never retracts
/// read access already granted. The generation identifies which `open` call
/// produced this source.
struct OpenSource {
    generation: u64,
    index: FeatureIndex,
    metadata: FxHashMap<String, String>,
}

/// Lifecycle state. `Opening` records the generation of the `open` call
/// that owns the transition, so a build left over from a cancelled open can
/// never publish over a later one.
enum EngineState {
    Closed,
    Opening(u64),
    Open(Arc<OpenSource>),
    Failed,
}

impl EngineState {
    fn status(&self) -> EngineStatus {
        match self {
            EngineState::Closed => EngineStatus::Closed,
            EngineState::Opening(_) => EngineStatus::Opening,
            EngineState::Open(_) => EngineStatus::Open,
            EngineState::Failed => EngineStatus::Failed,
        }
    }
}

/// Observability counters for the tile pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Tiles successfully encoded and returned
    pub tiles_served: u64,
    /// Served tiles whose layer contained no features
    pub tiles_empty: u64,
    /// Tile builds that failed and were reported as "no data"
    pub tile_failures: u64,
    /// Features excluded by the filter because of geometry errors
    pub features_skipped: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    tiles_served: AtomicU64,
    tiles_empty: AtomicU64,
    tile_failures: AtomicU64,
    features_skipped: AtomicU64,
}

/// The shapefile-to-vector-tile engine.
///
/// Owns the lifecycle of one opened data source: `open` parses the file and
/// bulk-builds the spatial index off-thread, `load_tile` serves concurrent
/// tile requests against the atomically published, immutable index, and
/// `close` releases everything. All entry points are safe to call from any
/// task; tile loads never surface an error, only "no data".
pub struct TileEngine {
    config: EngineConfig,
    source: Arc<dyn FeatureSource>,
    state: RwLock<EngineState>,
    generation: AtomicU64,
    cache: TileCache,
    stats: StatCounters,
}

impl TileEngine {
    /// Creates an engine reading shapefiles.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_source(config, Arc::new(ShapefileSource::new()))
    }

    /// Creates an engine with a custom feature source.
    pub fn with_source(config: EngineConfig, source: Arc<dyn FeatureSource>) -> Self {
        let cache = TileCache::new(config.cache_size);
        Self {
            config,
            source,
            state: RwLock::new(EngineState::Closed),
            generation: AtomicU64::new(0),
            cache,
            stats: StatCounters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn status(&self) -> EngineStatus {
        self.read_state(|state| state.status())
    }

    /// Metadata describing the opened data source; empty unless `Open`.
    pub fn metadata(&self) -> FxHashMap<String, String> {
        self.read_state(|state| match state {
            EngineState::Open(src) => src.metadata.clone(),
            _ => FxHashMap::default(),
        })
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tiles_served: self.stats.tiles_served.load(Ordering::Relaxed),
            tiles_empty: self.stats.tiles_empty.load(Ordering::Relaxed),
            tile_failures: self.stats.tile_failures.load(Ordering::Relaxed),
            features_skipped: self.stats.features_skipped.load(Ordering::Relaxed),
        }
    }

    /// Opens a data source: parses it and bulk-builds the spatial index on a
    /// blocking task, then publishes the result atomically.
    ///
    /// Legal from `Closed`, `Open` and `Failed` (the latter two are closed
    /// first, matching the behavior the host expects from "configuration
    /// changed, re-open"). An `open` racing an in-flight `open` is rejected
    /// with [`EngineError::OpenInProgress`] so two builds never interleave.
    /// A `close` (or a subsequent `open`) while the build is in flight
    /// cancels it: the stale result is discarded, whatever the current state
    /// is stays published, and the cancelled call returns
    /// [`EngineError::OpenCancelled`].
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        self.config.validate()?;
        let path: PathBuf = path.as_ref().to_path_buf();

        let generation = {
            let mut state = self.write_state();
            if matches!(*state, EngineState::Opening(_)) {
                return Err(EngineError::OpenInProgress);
            }
            // Idempotent close of any previous source; the generation ties
            // the upcoming build to this call
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            *state = EngineState::Opening(generation);
            generation
        };

        let source = Arc::clone(&self.source);
        let load_path = path.clone();
        let built = tokio::task::spawn_blocking(move || {
            let features = source.load(&load_path)?;
            let count = features.len();
            let index = FeatureIndex::bulk_load(features);
            log::info!("indexed {} features from {}", count, load_path.display());
            Ok::<FeatureIndex, EngineError>(index)
        })
        .await
        .map_err(|e| EngineError::ParseFailure(format!("index build task failed: {e}")))
        .and_then(|r| r);

        let mut state = self.write_state();
        match *state {
            EngineState::Opening(current) if current == generation => {}
            _ => {
                // Closed (and possibly re-opened) while the build was in
                // flight; the result belongs to a retracted lifecycle
                log::debug!("open of {} cancelled by concurrent close", path.display());
                return Err(EngineError::OpenCancelled);
            }
        }

        // Cache entries from any previous source die with it
        self.cache.clear();

        match built {
            Ok(index) => {
                let metadata = self.build_metadata(&index);
                *state = EngineState::Open(Arc::new(OpenSource {
                    generation,
                    index,
                    metadata,
                }));
                Ok(())
            }
            Err(e) => {
                log::error!("open of {} failed: {}", path.display(), e);
                *state = EngineState::Failed;
                Err(e)
            }
        }
    }

    /// Loads one tile, resolving to the encoded payload or `None` ("no
    /// data").
    ///
    /// `None` covers every non-serving case: engine not `Open`, zoom outside
    /// the configured range, coordinates outside `[0, 2^zoom)`, or an
    /// internal failure (logged and counted, never propagated, so a single
    /// bad tile cannot take down the map around it). In-range requests
    /// against an open engine always produce a payload, possibly with an
    /// empty layer.
    pub async fn load_tile(&self, coord: TileCoord) -> Option<Arc<Vec<u8>>> {
        let open = self.read_state(|state| match state {
            EngineState::Open(src) => Some(Arc::clone(src)),
            _ => None,
        })?;

        if coord.z < self.config.min_zoom || coord.z > self.config.max_zoom || !coord.is_valid() {
            log::debug!("tile {:?} out of range, returning no data", coord);
            return None;
        }

        if let Some(hit) = self.cache.get(&coord) {
            return Some(hit);
        }

        let layer_name = self.config.layer_name.clone();
        let extent = self.config.extent;
        let generation = open.generation;
        let built =
            tokio::task::spawn_blocking(move || build_tile(&open, coord, &layer_name, extent))
                .await;

        match built {
            Ok(Ok(outcome)) => {
                self.stats.tiles_served.fetch_add(1, Ordering::Relaxed);
                if outcome.feature_count == 0 {
                    self.stats.tiles_empty.fetch_add(1, Ordering::Relaxed);
                }
                self.stats
                    .features_skipped
                    .fetch_add(outcome.features_skipped as u64, Ordering::Relaxed);

                let payload = Arc::new(outcome.payload);
                // Only cache while the snapshotted source is still the
                // published one; a reopen may have raced this build
                let current = self.read_state(|state| match state {
                    EngineState::Open(src) => src.generation == generation,
                    _ => false,
                });
                if current {
                    self.cache.insert(coord, Arc::clone(&payload));
                }
                Some(payload)
            }
            Ok(Err(e)) => {
                log::error!("building tile {:?} failed: {}", coord, e);
                self.stats.tile_failures.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                log::error!("tile {:?} build task panicked: {}", coord, e);
                self.stats.tile_failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Releases the index and feature set and returns to `Closed`.
    ///
    /// Idempotent. In-flight tile loads keep their own handle to the old
    /// index and finish safely; an in-flight `open` is cancelled and
    /// resolves to [`EngineError::OpenCancelled`].
    pub fn close(&self) {
        let mut state = self.write_state();
        *state = EngineState::Closed;
        drop(state);
        self.cache.clear();
    }

    fn build_metadata(&self, index: &FeatureIndex) -> FxHashMap<String, String> {
        let mut metadata = FxHashMap::default();
        metadata.insert("format".to_string(), self.source.format().to_string());
        metadata.insert("feature_count".to_string(), index.len().to_string());
        metadata.insert("minzoom".to_string(), self.config.min_zoom.to_string());
        metadata.insert("maxzoom".to_string(), self.config.max_zoom.to_string());
        if let Some(bounds) = index.bounds() {
            // OpenLayers order: left, bottom, right, top
            metadata.insert(
                "bounds".to_string(),
                format!(
                    "{},{},{},{}",
                    bounds.south_west.lng,
                    bounds.south_west.lat,
                    bounds.north_east.lng,
                    bounds.north_east.lat
                ),
            );
        }
        metadata
    }

    fn read_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl crate::tiles::source::TileSource for TileEngine {
    async fn load_tile(&self, coord: TileCoord) -> Option<Arc<Vec<u8>>> {
        TileEngine::load_tile(self, coord).await
    }
}

struct TileOutcome {
    payload: Vec<u8>,
    feature_count: usize,
    features_skipped: usize,
}

/// The per-tile pipeline: bounds, coarse query, exact filter, encode.
fn build_tile(
    src: &OpenSource,
    coord: TileCoord,
    layer_name: &str,
    extent: u32,
) -> Result<TileOutcome> {
    let bounds = coord.bounds();
    let candidates = src.index.query(&bounds);
    let query = intersect::tile_polygon(&bounds);
    let (kept, skipped) = intersect::filter_intersecting(candidates, &query);

    log::debug!(
        "tile {:?}: {} intersecting features ({} skipped)",
        coord,
        kept.len(),
        skipped
    );

    let payload = encoder::encode_tile(coord, layer_name, &kept, extent)?;
    Ok(TileOutcome {
        payload,
        feature_count: kept.len(),
        features_skipped: skipped,
    })
}
