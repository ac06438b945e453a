use crate::core::geo::{LatLng, LatLngBounds};
use fxhash::FxHashMap;
use geo::BoundingRect;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};

/// A typed attribute value carried through the pipeline unmodified.
///
/// Shapefile attribute records (dbase fields) are mapped into this enum at
/// load time and re-emitted verbatim by the tile encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Attribute map of a single feature, keyed by field name
pub type AttributeMap = FxHashMap<String, AttributeValue>;

/// A geometry plus attributes, the atomic unit stored and queried.
///
/// The bounding box is precomputed at construction and used as the spatial
/// index key; the geometry itself is only touched by the exact intersection
/// filter and the encoder. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Feature {
    geometry: Geometry<f64>,
    bounds: LatLngBounds,
    attributes: AttributeMap,
}

impl Feature {
    /// Creates a feature, computing its bounding box from the geometry.
    ///
    /// Returns `None` for geometries without an extent (e.g. an empty
    /// multi-geometry), which cannot be indexed.
    pub fn new(geometry: Geometry<f64>, attributes: AttributeMap) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        let bounds = LatLngBounds::new(
            LatLng::new(rect.min().y, rect.min().x),
            LatLng::new(rect.max().y, rect.max().x),
        );

        Some(Self {
            geometry,
            bounds,
            attributes,
        })
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn bounds(&self) -> &LatLngBounds {
        &self.bounds
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Point};

    #[test]
    fn test_feature_bounds_from_polygon() {
        let poly = polygon![
            (x: 10.0, y: 20.0),
            (x: 14.0, y: 20.0),
            (x: 14.0, y: 25.0),
            (x: 10.0, y: 25.0),
        ];
        let feature = Feature::new(Geometry::Polygon(poly), AttributeMap::default()).unwrap();

        let bounds = feature.bounds();
        assert_eq!(bounds.south_west.lng, 10.0);
        assert_eq!(bounds.south_west.lat, 20.0);
        assert_eq!(bounds.north_east.lng, 14.0);
        assert_eq!(bounds.north_east.lat, 25.0);
    }

    #[test]
    fn test_feature_point_has_degenerate_bounds() {
        let feature = Feature::new(
            Geometry::Point(Point::new(3.0, 4.0)),
            AttributeMap::default(),
        )
        .unwrap();
        assert_eq!(feature.bounds().south_west, feature.bounds().north_east);
    }

    #[test]
    fn test_empty_multi_geometry_rejected() {
        let empty = Geometry::MultiPolygon(geo_types::MultiPolygon(vec![]));
        assert!(Feature::new(empty, AttributeMap::default()).is_none());
    }
}
