pub mod shapefile;
pub mod source;

// Re-exports for convenience
pub use shapefile::ShapefileSource;
pub use source::FeatureSource;
