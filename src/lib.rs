//! # shptile
//!
//! A shapefile-to-vector-tile engine.
//!
//! The engine loads a vector shapefile once into an immutable, bulk-loaded
//! spatial index and then serves concurrent requests for slippy-map tiles:
//! each `(x, y, zoom)` request computes the tile's geographic bounding box,
//! queries the index for candidates, filters them by exact geometric
//! intersection and encodes the survivors into a compact binary payload.
//!
//! ```no_run
//! use shptile::{EngineConfig, TileCoord, TileEngine};
//!
//! # async fn run() -> shptile::Result<()> {
//! let engine = TileEngine::new(EngineConfig::default());
//! engine.open("countries.shp").await?;
//!
//! if let Some(payload) = engine.load_tile(TileCoord::new(4, 5, 4)).await {
//!     // hand the bytes to the rendering layer
//!     let _ = payload.len();
//! }
//! engine.close();
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod data;
pub mod spatial;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    config::EngineConfig,
    feature::{AttributeMap, AttributeValue, Feature},
    geo::{tile_count, LatLng, LatLngBounds, TileCoord},
};

pub use crate::data::{shapefile::ShapefileSource, source::FeatureSource};

pub use crate::spatial::{index::FeatureIndex, intersect::GeometryError};

pub use crate::tiles::{
    encoder::{decode_tile, VectorTile},
    engine::{EngineStatus, TileEngine},
    source::TileSource,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, EngineError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("open already in progress")]
    OpenInProgress,

    #[error("open cancelled by a concurrent close")]
    OpenCancelled,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("tile encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

/// Error type alias for convenience
pub type Error = EngineError;
