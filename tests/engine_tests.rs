//! End-to-end tests of the tile pipeline through the public API.

use shptile::tiles::encoder::TileGeometry;
use shptile::{
    decode_tile, AttributeMap, AttributeValue, EngineConfig, Feature, FeatureSource, Result,
    TileCoord, TileEngine, TileSource,
};
use geo_types::{polygon, Geometry, MultiPolygon, Polygon};
use std::path::Path;
use std::sync::Arc;

/// In-memory feature source so the pipeline can be driven without fixture
/// files on disk.
struct MemorySource {
    features: Vec<Feature>,
}

impl MemorySource {
    fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }
}

impl FeatureSource for MemorySource {
    fn load(&self, _path: &Path) -> Result<Vec<Feature>> {
        Ok(self.features.clone())
    }

    fn format(&self) -> &str {
        "memory"
    }
}

fn square(min_x: f64, min_y: f64, size: f64) -> Polygon<f64> {
    polygon![
        (x: min_x, y: min_y),
        (x: min_x + size, y: min_y),
        (x: min_x + size, y: min_y + size),
        (x: min_x, y: min_y + size),
    ]
}

fn named(geometry: Geometry<f64>, name: &str) -> Feature {
    let mut attributes = AttributeMap::default();
    attributes.insert("NAME".to_string(), AttributeValue::Text(name.to_string()));
    Feature::new(geometry, attributes).unwrap()
}

fn engine_with(features: Vec<Feature>) -> TileEngine {
    TileEngine::with_source(EngineConfig::default(), Arc::new(MemorySource::new(features)))
}

async fn open(engine: &TileEngine) {
    let _ = env_logger::builder().is_test(true).try_init();
    engine.open("in-memory").await.expect("open failed");
}

fn names_in(payload: &[u8]) -> Vec<String> {
    let tile = decode_tile(payload).unwrap();
    tile.layers[0]
        .features
        .iter()
        .map(|f| match f.attributes.get("NAME") {
            Some(AttributeValue::Text(s)) => s.clone(),
            other => panic!("unexpected NAME attribute: {:?}", other),
        })
        .collect()
}

#[tokio::test]
async fn empty_source_serves_valid_empty_tiles() {
    let engine = engine_with(Vec::new());
    open(&engine).await;

    let payload = engine.load_tile(TileCoord::new(0, 0, 0)).await.unwrap();
    let tile = decode_tile(&payload).unwrap();
    assert_eq!(tile.layers.len(), 1);
    assert!(tile.layers[0].features.is_empty());
}

#[tokio::test]
async fn feature_outside_tile_bounds_is_excluded() {
    // At zoom 1, tile (0,0) covers the northwest quadrant. A polygon in the
    // southeast quadrant must never show up there.
    let engine = engine_with(vec![
        named(Geometry::Polygon(square(-120.0, 20.0, 30.0)), "northwest"),
        named(Geometry::Polygon(square(100.0, -50.0, 20.0)), "southeast"),
    ]);
    open(&engine).await;

    let nw = engine.load_tile(TileCoord::new(0, 0, 1)).await.unwrap();
    assert_eq!(names_in(&nw), vec!["northwest"]);

    let se = engine.load_tile(TileCoord::new(1, 1, 1)).await.unwrap();
    assert_eq!(names_in(&se), vec!["southeast"]);
}

#[tokio::test]
async fn multi_part_feature_with_one_intersecting_part_is_included() {
    // First part far away, second part inside the northwest quadrant.
    let mp = MultiPolygon(vec![square(100.0, -50.0, 10.0), square(-120.0, 20.0, 10.0)]);
    let engine = engine_with(vec![named(Geometry::MultiPolygon(mp), "split")]);
    open(&engine).await;

    let nw = engine.load_tile(TileCoord::new(0, 0, 1)).await.unwrap();
    assert_eq!(names_in(&nw), vec!["split"]);
}

#[tokio::test]
async fn bbox_overlap_without_true_intersection_is_filtered() {
    // An L-shaped polygon whose bounding box covers the whole west half but
    // whose actual geometry stays out of the far northwest corner tile.
    let l_shape: Polygon<f64> = polygon![
        (x: -170.0, y: -80.0),
        (x: -10.0, y: -80.0),
        (x: -10.0, y: 80.0),
        (x: -20.0, y: 80.0),
        (x: -20.0, y: -70.0),
        (x: -170.0, y: -70.0),
    ];
    let engine = engine_with(vec![named(Geometry::Polygon(l_shape), "ell")]);
    open(&engine).await;

    // Tile (0,0) at zoom 3 covers lng [-180,-135], lat above 79.2: inside
    // the bbox but away from both arms of the L.
    let corner = engine.load_tile(TileCoord::new(0, 0, 3)).await.unwrap();
    assert!(names_in(&corner).is_empty());

    // A tile over the vertical arm does contain it.
    let arm = engine.load_tile(TileCoord::new(3, 3, 3)).await.unwrap();
    assert_eq!(names_in(&arm), vec!["ell"]);
}

#[tokio::test]
async fn round_trip_preserves_count_attributes_and_geometry_kind() {
    let engine = engine_with(vec![
        named(Geometry::Polygon(square(-60.0, -30.0, 120.0)), "big"),
        named(Geometry::Point(geo_types::Point::new(0.0, 0.0)), "origin"),
    ]);
    open(&engine).await;

    let payload = engine.load_tile(TileCoord::new(0, 0, 0)).await.unwrap();
    let tile = decode_tile(&payload).unwrap();
    let layer = &tile.layers[0];

    assert_eq!(layer.features.len(), 2);
    assert_eq!(layer.extent, 4096);
    let kinds: Vec<&str> = layer.features.iter().map(|f| f.geometry.kind()).collect();
    assert!(kinds.contains(&"polygon"));
    assert!(kinds.contains(&"point"));
}

#[tokio::test]
async fn malformed_feature_does_not_blank_the_tile() {
    let broken = Polygon::new(
        geo_types::LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]),
        vec![],
    );
    let engine = engine_with(vec![
        named(Geometry::Polygon(broken), "broken"),
        named(Geometry::Polygon(square(-60.0, -30.0, 120.0)), "good"),
    ]);
    open(&engine).await;

    let payload = engine.load_tile(TileCoord::new(0, 0, 0)).await.unwrap();
    assert_eq!(names_in(&payload), vec!["good"]);
    assert_eq!(engine.stats().features_skipped, 1);
}

#[tokio::test]
async fn cached_tile_is_shared() {
    let engine = engine_with(vec![named(
        Geometry::Polygon(square(-60.0, -30.0, 120.0)),
        "big",
    )]);
    open(&engine).await;

    let coord = TileCoord::new(0, 0, 0);
    let first = engine.load_tile(coord).await.unwrap();
    let second = engine.load_tile(coord).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_loads_observe_a_single_published_feature_set() {
    let world: Polygon<f64> = polygon![
        (x: -170.0, y: -80.0),
        (x: 170.0, y: -80.0),
        (x: 170.0, y: 80.0),
        (x: -170.0, y: 80.0),
    ];
    let engine = Arc::new(engine_with(vec![named(Geometry::Polygon(world), "world")]));
    open(&engine).await;

    // Many in-flight loads across zoom levels; every payload must decode to
    // exactly the one published feature set, never a torn mixture.
    let mut handles = Vec::new();
    for z in 0..4u8 {
        for x in 0..shptile::tile_count(z) {
            for y in 0..shptile::tile_count(z) {
                let engine = Arc::clone(&engine);
                handles.push(tokio::spawn(async move {
                    engine.load_tile(TileCoord::new(x, y, z)).await
                }));
            }
        }
    }

    for handle in handles {
        let payload = handle.await.unwrap().expect("in-range tile must serve");
        assert_eq!(names_in(&payload), vec!["world"]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_during_in_flight_loads_is_safe() {
    let world: Polygon<f64> = polygon![
        (x: -170.0, y: -80.0),
        (x: 170.0, y: -80.0),
        (x: 170.0, y: 80.0),
        (x: -170.0, y: 80.0),
    ];
    let engine = Arc::new(engine_with(vec![named(Geometry::Polygon(world), "world")]));
    open(&engine).await;

    let mut handles = Vec::new();
    for x in 0..8u32 {
        for y in 0..8u32 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.load_tile(TileCoord::new(x, y, 3)).await
            }));
        }
    }

    engine.close();

    // Loads that snapshotted the index before close still finish with valid
    // payloads; the rest resolve to no data. Either way, nothing panics.
    for handle in handles {
        if let Some(payload) = handle.await.unwrap() {
            assert_eq!(names_in(&payload), vec!["world"]);
        }
    }
    assert!(engine.load_tile(TileCoord::new(0, 0, 3)).await.is_none());
}

#[tokio::test]
async fn engine_serves_through_the_tile_source_trait() {
    let engine = engine_with(vec![named(
        Geometry::Polygon(square(-60.0, -30.0, 120.0)),
        "big",
    )]);
    open(&engine).await;

    let source: &dyn TileSource = &engine;
    let payload = source.load_tile(TileCoord::new(0, 0, 0)).await.unwrap();
    assert!(!names_in(&payload).is_empty());
}

#[tokio::test]
async fn tiny_feature_geometry_collapses_but_attributes_survive() {
    let speck = square(10.0, 10.0, 1e-9);
    let engine = engine_with(vec![named(Geometry::Polygon(speck), "speck")]);
    open(&engine).await;

    let payload = engine.load_tile(TileCoord::new(0, 0, 0)).await.unwrap();
    let tile = decode_tile(&payload).unwrap();
    let feature = &tile.layers[0].features[0];
    assert_eq!(names_in(&payload), vec!["speck"]);
    let TileGeometry::Rings(rings) = &feature.geometry else {
        panic!("expected polygon geometry");
    };
    assert!(rings.is_empty());
}
