use crate::core::{
    feature::Feature,
    geo::LatLngBounds,
};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;

/// An indexed feature: the R-tree entry is the feature's precomputed
/// bounding box, the payload a shared handle to the feature itself.
#[derive(Debug, Clone)]
struct IndexedFeature {
    feature: Arc<Feature>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let bounds = self.feature.bounds();
        AABB::from_corners(
            [bounds.south_west.lng, bounds.south_west.lat],
            [bounds.north_east.lng, bounds.north_east.lat],
        )
    }
}

/// Bulk-loaded, immutable R-tree over feature bounding boxes.
///
/// Construction uses `rstar`'s bulk load (sort-tile-recursive), which is
/// near-linear and yields a balanced tree, so hundred-thousand-feature
/// shapefiles index quickly on the open path. There is deliberately no
/// insert/remove surface: the index is built once per opened data source
/// and only read afterward, which is what makes lock-free concurrent
/// queries safe.
pub struct FeatureIndex {
    rtree: RTree<IndexedFeature>,
    bounds: Option<LatLngBounds>,
}

impl FeatureIndex {
    /// Builds the index from a full feature collection in one pass.
    pub fn bulk_load(features: Vec<Feature>) -> Self {
        let mut bounds: Option<LatLngBounds> = None;
        for feature in &features {
            match bounds {
                Some(ref mut b) => *b = b.union(feature.bounds()),
                None => bounds = Some(feature.bounds().clone()),
            }
        }

        let items = features
            .into_iter()
            .map(|feature| IndexedFeature {
                feature: Arc::new(feature),
            })
            .collect();

        Self {
            rtree: RTree::bulk_load(items),
            bounds,
        }
    }

    /// Returns every feature whose bounding box overlaps `bounds`.
    ///
    /// This is the coarse filter: a superset of the true intersections,
    /// refined later by the exact predicate. Querying an empty index
    /// returns an empty result.
    pub fn query(&self, bounds: &LatLngBounds) -> Vec<Arc<Feature>> {
        let envelope = AABB::from_corners(
            [bounds.south_west.lng, bounds.south_west.lat],
            [bounds.north_east.lng, bounds.north_east.lat],
        );
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| Arc::clone(&item.feature))
            .collect()
    }

    /// Union of all indexed bounding boxes, `None` when empty
    pub fn bounds(&self) -> Option<&LatLngBounds> {
        self.bounds.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::AttributeMap;
    use geo_types::{polygon, Geometry};

    fn square(min_x: f64, min_y: f64, size: f64) -> Feature {
        let poly = polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
        ];
        Feature::new(Geometry::Polygon(poly), AttributeMap::default()).unwrap()
    }

    #[test]
    fn test_empty_index_query_returns_empty() {
        let index = FeatureIndex::bulk_load(Vec::new());
        assert!(index.is_empty());
        assert!(index.bounds().is_none());

        let result = index.query(&LatLngBounds::from_coords(-90.0, -180.0, 90.0, 180.0));
        assert!(result.is_empty());
    }

    #[test]
    fn test_query_returns_overlapping_bounds_only() {
        let index = FeatureIndex::bulk_load(vec![
            square(0.0, 0.0, 1.0),
            square(10.0, 10.0, 1.0),
            square(50.0, 50.0, 1.0),
        ]);
        assert_eq!(index.len(), 3);

        let hits = index.query(&LatLngBounds::from_coords(-1.0, -1.0, 12.0, 12.0));
        assert_eq!(hits.len(), 2);

        let miss = index.query(&LatLngBounds::from_coords(80.0, 80.0, 85.0, 85.0));
        assert!(miss.is_empty());
    }

    #[test]
    fn test_touching_bounds_count_as_overlap() {
        let index = FeatureIndex::bulk_load(vec![square(0.0, 0.0, 1.0)]);
        let hits = index.query(&LatLngBounds::from_coords(1.0, 1.0, 2.0, 2.0));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_overall_bounds_is_union() {
        let index = FeatureIndex::bulk_load(vec![square(0.0, 0.0, 1.0), square(10.0, 10.0, 1.0)]);
        let bounds = index.bounds().unwrap();
        assert_eq!(bounds.south_west.lng, 0.0);
        assert_eq!(bounds.north_east.lat, 11.0);
    }
}
