use crate::core::feature::{AttributeMap, AttributeValue, Feature};
use crate::data::source::FeatureSource;
use crate::{EngineError, Result};
use shapefile::dbase::FieldValue;
use std::path::Path;

/// Feature source reading ESRI shapefiles.
///
/// Expects the companion `.shx`/`.dbf` files next to the `.shp` file, as is
/// conventional for the format. Geometries are converted to `geo-types`
/// shapes; attribute records come from the dbase table. Shapes that cannot
/// be converted (null shapes, multipatch, empty geometries) are skipped with
/// a warning rather than failing the whole load.
#[derive(Debug, Default)]
pub struct ShapefileSource;

impl ShapefileSource {
    pub fn new() -> Self {
        Self
    }

    fn convert_record(record: shapefile::dbase::Record) -> AttributeMap {
        let mut attributes = AttributeMap::default();
        for (name, value) in record.into_iter() {
            let converted = match value {
                FieldValue::Character(Some(s)) => AttributeValue::Text(s),
                FieldValue::Numeric(Some(n)) => AttributeValue::Float(n),
                FieldValue::Logical(Some(b)) => AttributeValue::Bool(b),
                FieldValue::Float(Some(f)) => AttributeValue::Float(f as f64),
                FieldValue::Integer(i) => AttributeValue::Int(i as i64),
                FieldValue::Double(d) => AttributeValue::Float(d),
                FieldValue::Character(None)
                | FieldValue::Numeric(None)
                | FieldValue::Logical(None)
                | FieldValue::Float(None) => AttributeValue::Null,
                other => {
                    log::debug!("attribute field {name}: unmapped dbase type {other:?}");
                    AttributeValue::Null
                }
            };
            attributes.insert(name, converted);
        }
        attributes
    }
}

impl FeatureSource for ShapefileSource {
    fn load(&self, path: &Path) -> Result<Vec<Feature>> {
        if !path.exists() {
            return Err(EngineError::FileNotFound(path.to_path_buf()));
        }

        let is_shp = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);
        if !is_shp {
            return Err(EngineError::UnsupportedFormat(format!(
                "{} is not a .shp file",
                path.display()
            )));
        }

        let mut reader = shapefile::Reader::from_path(path)
            .map_err(|e| EngineError::ParseFailure(format!("{}: {}", path.display(), e)))?;

        let mut features = Vec::new();
        let mut skipped = 0usize;

        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result
                .map_err(|e| EngineError::ParseFailure(format!("{}: {}", path.display(), e)))?;

            let geometry = match geo_types::Geometry::<f64>::try_from(shape) {
                Ok(geometry) => geometry,
                Err(e) => {
                    log::warn!("skipping unconvertible shape: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            match Feature::new(geometry, Self::convert_record(record)) {
                Some(feature) => features.push(feature),
                None => {
                    log::warn!("skipping shape without a bounding box");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            log::info!(
                "loaded {} features from {} ({} invalid shapes skipped)",
                features.len(),
                path.display(),
                skipped
            );
        }

        Ok(features)
    }

    fn format(&self) -> &str {
        "shp"
    }
}
