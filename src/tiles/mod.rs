pub mod cache;
pub mod encoder;
pub mod engine;
pub mod source;

// Re-exports for convenience
pub use encoder::{decode_tile, encode_tile, VectorTile};
pub use engine::{EngineStatus, TileEngine};
pub use source::TileSource;
