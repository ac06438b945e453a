//! Exact intersection filtering.
//!
//! The spatial index only compares bounding boxes; this module refines its
//! candidates with true geometric predicates against the tile polygon.
//! Multi-part geometries use partial-union semantics: the feature survives
//! if any single part intersects the tile.

use crate::core::{feature::Feature, geo::LatLngBounds};
use geo::Intersects;
use geo_types::{Coord, Geometry, LineString, Polygon};
use std::sync::Arc;

/// Per-feature geometry failure, recovered locally during filtering.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("ring has {0} coordinates, at least 4 required")]
    DegenerateRing(usize),

    #[error("geometry contains a non-finite coordinate")]
    NonFiniteCoordinate,
}

/// Builds the query polygon for a tile: its bounding box as a closed ring.
pub fn tile_polygon(bounds: &LatLngBounds) -> Polygon<f64> {
    let (west, south) = (bounds.south_west.lng, bounds.south_west.lat);
    let (east, north) = (bounds.north_east.lng, bounds.north_east.lat);

    Polygon::new(
        LineString::from(vec![
            (west, south),
            (east, south),
            (east, north),
            (west, north),
            (west, south),
        ]),
        vec![],
    )
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), GeometryError> {
    if ring.0.len() < 4 {
        return Err(GeometryError::DegenerateRing(ring.0.len()));
    }
    validate_coords(&ring.0)
}

fn validate_coords(coords: &[Coord<f64>]) -> Result<(), GeometryError> {
    if coords
        .iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return Err(GeometryError::NonFiniteCoordinate);
    }
    Ok(())
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    validate_ring(polygon.exterior())?;
    for interior in polygon.interiors() {
        validate_ring(interior)?;
    }
    Ok(())
}

/// Decides whether a feature truly intersects the query polygon.
///
/// A malformed part fails the whole feature with a [`GeometryError`]; the
/// caller skips that feature and continues with the rest of the candidates.
pub fn feature_intersects(
    feature: &Feature,
    query: &Polygon<f64>,
) -> Result<bool, GeometryError> {
    match feature.geometry() {
        Geometry::MultiPolygon(parts) => {
            for part in &parts.0 {
                validate_polygon(part)?;
                if query.intersects(part) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Geometry::Polygon(polygon) => {
            validate_polygon(polygon)?;
            Ok(query.intersects(polygon))
        }
        Geometry::MultiLineString(parts) => {
            for part in &parts.0 {
                validate_coords(&part.0)?;
                if query.intersects(part) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Geometry::LineString(line) => {
            validate_coords(&line.0)?;
            Ok(query.intersects(line))
        }
        Geometry::MultiPoint(parts) => {
            Ok(parts.0.iter().any(|point| query.intersects(point)))
        }
        other => Ok(other.intersects(query)),
    }
}

/// Refines index candidates to the features that truly intersect the tile.
///
/// Returns the surviving features plus the number skipped because of
/// geometry errors; each skip is also logged, never silently absorbed.
pub fn filter_intersecting(
    candidates: Vec<Arc<Feature>>,
    query: &Polygon<f64>,
) -> (Vec<Arc<Feature>>, usize) {
    let mut surviving = Vec::with_capacity(candidates.len());
    let mut skipped = 0usize;

    for candidate in candidates {
        match feature_intersects(&candidate, query) {
            Ok(true) => surviving.push(candidate),
            Ok(false) => {}
            Err(e) => {
                log::warn!("excluding feature with malformed geometry: {}", e);
                skipped += 1;
            }
        }
    }

    (surviving, skipped)
}
