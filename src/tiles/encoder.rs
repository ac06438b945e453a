//! Binary vector-tile encoding.
//!
//! # Wire format (version 1)
//!
//! A tile is a [`VectorTile`] value serialized with `bincode` (little-endian,
//! length-prefixed collections): a format version, the tile address, and one
//! or more named layers. Each layer carries its extent and an ordered feature
//! list; each feature carries a geometry kind with quantized coordinates and
//! its attribute map. The version field is checked on decode, so incompatible
//! layout changes bump [`TILE_FORMAT_VERSION`].
//!
//! # Quantization
//!
//! Coordinates are mapped from geographic space onto a local integer grid of
//! `0..=extent` per axis covering the tile's bounding box, by linear scaling.
//! Tile-local y grows southward (screen convention). Feature count and
//! attributes round-trip losslessly; coordinates round-trip within one grid
//! unit.
//!
//! # Winding
//!
//! Polygon rings are normalized so exterior rings wind clockwise on screen
//! (positive surveyor sum in the y-down tile grid) and interior rings wind
//! counter-clockwise. Rings are stored unclosed; decoders re-close them.

use crate::core::{
    feature::{AttributeMap, Feature},
    geo::{LatLngBounds, TileCoord},
};
use crate::Result;
use geo_types::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current wire format version
pub const TILE_FORMAT_VERSION: u16 = 1;

/// A quantized tile-local coordinate pair
pub type TilePoint = [u16; 2];

/// Quantized geometry of one encoded feature.
///
/// Polygon rings are flattened; winding distinguishes exterior (clockwise)
/// from interior (counter-clockwise) rings. A feature whose geometry fully
/// collapses under quantization keeps an empty coordinate list so that the
/// feature itself (and its attributes) still round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TileGeometry {
    Points(Vec<TilePoint>),
    Lines(Vec<Vec<TilePoint>>),
    Rings(Vec<Vec<TilePoint>>),
}

impl TileGeometry {
    /// Geometry kind discriminator for consumers
    pub fn kind(&self) -> &'static str {
        match self {
            TileGeometry::Points(_) => "point",
            TileGeometry::Lines(_) => "line",
            TileGeometry::Rings(_) => "polygon",
        }
    }
}

/// One encoded feature: quantized geometry plus pass-through attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFeature {
    pub geometry: TileGeometry,
    pub attributes: AttributeMap,
}

/// A named layer inside a tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub name: String,
    pub extent: u32,
    pub features: Vec<TileFeature>,
}

/// Decoded form of a binary tile payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorTile {
    pub version: u16,
    pub x: u32,
    pub y: u32,
    pub z: u8,
    pub layers: Vec<TileLayer>,
}

/// Maps one geographic coordinate into the tile-local integer grid
fn quantize(bounds: &LatLngBounds, extent: u32, lng: f64, lat: f64) -> TilePoint {
    let width = bounds.north_east.lng - bounds.south_west.lng;
    let height = bounds.north_east.lat - bounds.south_west.lat;

    let sx = (lng - bounds.south_west.lng) / width;
    // y grows southward within the tile
    let sy = (bounds.north_east.lat - lat) / height;

    let max = extent as f64;
    let x = (sx * max).round().clamp(0.0, max) as u16;
    let y = (sy * max).round().clamp(0.0, max) as u16;
    [x, y]
}

/// Drops consecutive duplicate points produced by quantization
fn dedup(points: Vec<TilePoint>) -> Vec<TilePoint> {
    let mut out: Vec<TilePoint> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    out
}

/// Twice the signed area of a ring via the surveyor's formula, computed in
/// the y-down tile grid: positive means clockwise on screen.
fn signed_area2(ring: &[TilePoint]) -> i64 {
    let n = ring.len();
    if n < 3 {
        return 0;
    }
    let mut sum = 0i64;
    for i in 0..n {
        let [x1, y1] = ring[i];
        let [x2, y2] = ring[(i + 1) % n];
        sum += x1 as i64 * y2 as i64 - x2 as i64 * y1 as i64;
    }
    sum
}

/// Quantizes a ring, unclosing it and enforcing the requested winding.
/// Returns `None` when the ring collapses below three distinct points.
fn encode_ring(
    ring: &LineString<f64>,
    bounds: &LatLngBounds,
    extent: u32,
    clockwise: bool,
) -> Option<Vec<TilePoint>> {
    let mut points = dedup(
        ring.0
            .iter()
            .map(|c| quantize(bounds, extent, c.x, c.y))
            .collect(),
    );
    // Unclose: the wire format re-closes rings implicitly
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return None;
    }
    let area2 = signed_area2(&points);
    if area2 == 0 {
        return None;
    }
    if (area2 > 0) != clockwise {
        points.reverse();
    }
    Some(points)
}

fn encode_polygon(
    polygon: &Polygon<f64>,
    bounds: &LatLngBounds,
    extent: u32,
    rings: &mut Vec<Vec<TilePoint>>,
) {
    // Exterior clockwise, interiors counter-clockwise; interiors of a
    // collapsed exterior are meaningless and dropped with it.
    let Some(exterior) = encode_ring(polygon.exterior(), bounds, extent, true) else {
        log::debug!("dropping polygon collapsed by quantization");
        return;
    };
    rings.push(exterior);
    for interior in polygon.interiors() {
        if let Some(ring) = encode_ring(interior, bounds, extent, false) {
            rings.push(ring);
        }
    }
}

fn encode_line(
    line: &LineString<f64>,
    bounds: &LatLngBounds,
    extent: u32,
    lines: &mut Vec<Vec<TilePoint>>,
) {
    let points = dedup(
        line.0
            .iter()
            .map(|c| quantize(bounds, extent, c.x, c.y))
            .collect(),
    );
    if points.len() >= 2 {
        lines.push(points);
    }
}

/// Quantizes one feature's geometry into tile-local coordinates
fn encode_geometry(geometry: &Geometry<f64>, bounds: &LatLngBounds, extent: u32) -> TileGeometry {
    match geometry {
        Geometry::Point(p) => TileGeometry::Points(vec![quantize(bounds, extent, p.x(), p.y())]),
        Geometry::MultiPoint(mp) => TileGeometry::Points(
            mp.0.iter()
                .map(|p| quantize(bounds, extent, p.x(), p.y()))
                .collect(),
        ),
        Geometry::Line(line) => {
            let mut lines = Vec::with_capacity(1);
            encode_line(&LineString::from(vec![line.start, line.end]), bounds, extent, &mut lines);
            TileGeometry::Lines(lines)
        }
        Geometry::LineString(line) => {
            let mut lines = Vec::with_capacity(1);
            encode_line(line, bounds, extent, &mut lines);
            TileGeometry::Lines(lines)
        }
        Geometry::MultiLineString(mls) => {
            let mut lines = Vec::with_capacity(mls.0.len());
            for line in &mls.0 {
                encode_line(line, bounds, extent, &mut lines);
            }
            TileGeometry::Lines(lines)
        }
        Geometry::Polygon(polygon) => {
            let mut rings = Vec::new();
            encode_polygon(polygon, bounds, extent, &mut rings);
            TileGeometry::Rings(rings)
        }
        Geometry::MultiPolygon(mp) => {
            let mut rings = Vec::new();
            for polygon in &mp.0 {
                encode_polygon(polygon, bounds, extent, &mut rings);
            }
            TileGeometry::Rings(rings)
        }
        Geometry::Rect(rect) => {
            let mut rings = Vec::new();
            encode_polygon(&rect.to_polygon(), bounds, extent, &mut rings);
            TileGeometry::Rings(rings)
        }
        Geometry::Triangle(tri) => {
            let mut rings = Vec::new();
            encode_polygon(&tri.to_polygon(), bounds, extent, &mut rings);
            TileGeometry::Rings(rings)
        }
        Geometry::GeometryCollection(_) => {
            // Shapefiles cannot express nested collections
            log::debug!("geometry collection not encodable, emitting empty geometry");
            TileGeometry::Points(Vec::new())
        }
    }
}

/// Serializes a filtered feature set into a binary tile payload.
///
/// An empty feature list still produces a structurally valid tile with one
/// empty layer, never an error.
pub fn encode_tile(
    coord: TileCoord,
    layer_name: &str,
    features: &[Arc<Feature>],
    extent: u32,
) -> Result<Vec<u8>> {
    let bounds = coord.bounds();

    let encoded = features
        .iter()
        .map(|feature| TileFeature {
            geometry: encode_geometry(feature.geometry(), &bounds, extent),
            attributes: feature.attributes().clone(),
        })
        .collect();

    let tile = VectorTile {
        version: TILE_FORMAT_VERSION,
        x: coord.x,
        y: coord.y,
        z: coord.z,
        layers: vec![TileLayer {
            name: layer_name.to_string(),
            extent,
            features: encoded,
        }],
    };

    Ok(bincode::serialize(&tile)?)
}

/// Decodes a binary tile payload, rejecting unknown format versions.
pub fn decode_tile(bytes: &[u8]) -> Result<VectorTile> {
    let tile: VectorTile = bincode::deserialize(bytes)?;
    if tile.version != TILE_FORMAT_VERSION {
        return Err(crate::EngineError::UnsupportedFormat(format!(
            "tile format version {} (expected {})",
            tile.version, TILE_FORMAT_VERSION
        )));
    }
    Ok(tile)
}
