pub mod index;
pub mod intersect;

pub use index::FeatureIndex;
pub use intersect::GeometryError;
