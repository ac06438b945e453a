use crate::core::feature::Feature;
use crate::Result;
use std::path::Path;

/// Trait representing anything that can load a feature collection from a
/// path: the seam between the engine and the geometry parser.
///
/// Implementations are expected to be pure with respect to the engine: a
/// successful load yields an ordered feature list, a failed one yields a
/// typed error, and nothing is cached inside the source itself.
pub trait FeatureSource: Send + Sync {
    /// Reads all features from the data set at `path`.
    fn load(&self, path: &Path) -> Result<Vec<Feature>>;

    /// Short format discriminator for the metadata surface (e.g. `"shp"`).
    fn format(&self) -> &str;
}
