//! Engine configuration.
//!
//! A single flat options struct; callers either take the defaults or build a
//! custom one before constructing the engine. The configuration is fixed for
//! the lifetime of an engine instance.

use crate::{EngineError, Result};

/// Options controlling the tile engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Lowest zoom level the engine serves
    pub min_zoom: u8,
    /// Highest zoom level the engine serves
    pub max_zoom: u8,
    /// Local integer grid size per tile axis (coordinate quantization target)
    pub extent: u32,
    /// Name of the single layer written into each tile
    pub layer_name: String,
    /// Capacity of the encoded-tile LRU cache
    pub cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 20,
            extent: 4096,
            layer_name: "layer1".to_string(),
            cache_size: 1024,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    ///
    /// Quantized coordinates are stored as `u16`, so the extent must fit;
    /// zoom is capped below 31 so `2^zoom` fits a `u32` tile count.
    pub fn validate(&self) -> Result<()> {
        if self.min_zoom > self.max_zoom {
            return Err(EngineError::Configuration(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.max_zoom > 30 {
            return Err(EngineError::Configuration(format!(
                "max_zoom {} exceeds supported maximum 30",
                self.max_zoom
            )));
        }
        if self.extent == 0 || self.extent > u16::MAX as u32 {
            return Err(EngineError::Configuration(format!(
                "extent {} outside supported range 1..={}",
                self.extent,
                u16::MAX
            )));
        }
        if self.layer_name.is_empty() {
            return Err(EngineError::Configuration(
                "layer_name must not be empty".to_string(),
            ));
        }
        if self.cache_size == 0 {
            return Err(EngineError::Configuration(
                "cache_size must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}
