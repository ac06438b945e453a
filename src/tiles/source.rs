use crate::core::geo::TileCoord;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait representing anything that can produce tile payloads for a given
/// coordinate: the seam between the engine and the rendering layer.
///
/// `None` means "no data" for that coordinate; the rendering layer treats
/// it as an empty tile, never as an error.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Resolve the payload for the requested `coord`, or `None`.
    async fn load_tile(&self, coord: TileCoord) -> Option<Arc<Vec<u8>>>;
}
