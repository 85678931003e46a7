use crate::common::{Ring, Value};
use crate::error::EncodeError;
use crate::proto::vector_tile as pbf;
use crate::proto::vector_tile::GeomType;

use log::{debug, trace};
use quick_protobuf::{MessageWrite, Writer};
use serde_json::{Map, Value as JsonValue};

use std::collections::{HashMap, HashSet};

const DEFAULT_VERSION: u32 = 1;
const DEFAULT_EXTENT: u32 = 4096;

/// One feature as the encoder sees it, independent of how the tile was
/// produced.
pub trait EncodableFeature {
    /// Integer feature id, if one exists. A feature without a derivable
    /// integer id writes no id field at all.
    fn id(&self) -> Option<u64>;

    fn geom_type(&self) -> GeomType;

    /// Attribute map in insertion order. Values may be arbitrary JSON;
    /// normalization happens during encoding.
    fn properties(&self) -> &Map<String, JsonValue>;

    /// Rings in layer-extent space. Called at most once per feature.
    fn load_geometry(&self) -> Vec<Ring>;
}

impl<F: EncodableFeature + ?Sized> EncodableFeature for &F {
    fn id(&self) -> Option<u64> {
        (**self).id()
    }

    fn geom_type(&self) -> GeomType {
        (**self).geom_type()
    }

    fn properties(&self) -> &Map<String, JsonValue> {
        (**self).properties()
    }

    fn load_geometry(&self) -> Vec<Ring> {
        (**self).load_geometry()
    }
}

/// One layer as the encoder sees it. Implemented by the owned [`Layer`]
/// object graph and by the GeoJSON adapter in [`crate::geojson`]; the
/// implementation is picked at construction time, never during encoding.
pub trait EncodableLayer {
    type Feature<'a>: EncodableFeature
    where
        Self: 'a;

    fn name(&self) -> &str;
    fn version(&self) -> u32;
    fn extent(&self) -> u32;
    fn feature_count(&self) -> usize;
    fn feature(&self, index: usize) -> Self::Feature<'_>;
}

/// Per-layer interning tables. Built fresh for each layer pass and
/// discarded with it; never shared across layers.
#[derive(Default)]
struct Context {
    keys: Vec<String>,
    values: Vec<Value>,
    keycache: HashMap<String, u32>,
    valuecache: HashMap<String, u32>,
}

impl Context {
    fn key_index(&mut self, key: &str) -> u32 {
        if let Some(&index) = self.keycache.get(key) {
            return index;
        }
        let index = self.keys.len() as u32;
        self.keys.push(key.to_owned());
        self.keycache.insert(key.to_owned(), index);
        index
    }

    fn value_index(&mut self, value: Value) -> u32 {
        let cache_key = value.cache_key();
        if let Some(&index) = self.valuecache.get(&cache_key) {
            return index;
        }
        let index = self.values.len() as u32;
        self.values.push(value);
        self.valuecache.insert(cache_key, index);
        index
    }
}

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

fn command_integer(command: u32, count: u32) -> u32 {
    (count << 3) | (command & 0x7)
}

fn zigzag(param: i32) -> u32 {
    ((param << 1) ^ (param >> 31)) as u32
}

/// Builds the MVT command stream for one feature.
///
/// The cursor starts at (0, 0) and persists across rings. For polygons the
/// stored closing point duplicates the first one and is not re-emitted;
/// its edge is implied by ClosePath. LineTo is never emitted with a
/// non-positive count, and ClosePath only follows an actual LineTo run.
fn encode_geometry(geom_type: GeomType, rings: &[Ring]) -> Vec<u32> {
    let mut commands = Vec::new();
    let mut x = 0i32;
    let mut y = 0i32;

    for ring in rings {
        let move_count = if geom_type == GeomType::Point {
            ring.len() as u32
        } else {
            1
        };
        commands.push(command_integer(MOVE_TO, move_count));

        let line_len = if geom_type == GeomType::Polygon {
            ring.len().saturating_sub(1)
        } else {
            ring.len()
        };
        for (i, &(px, py)) in ring[..line_len].iter().enumerate() {
            if i == 1 && geom_type != GeomType::Point {
                commands.push(command_integer(LINE_TO, (line_len - 1) as u32));
            }
            let dx = px - x;
            let dy = py - y;
            commands.push(zigzag(dx));
            commands.push(zigzag(dy));
            x += dx;
            y += dy;
        }
        if geom_type == GeomType::Polygon && line_len > 1 {
            commands.push(command_integer(CLOSE_PATH, 1));
        }
    }

    commands
}

fn encode_feature<F: EncodableFeature>(feature: &F, context: &mut Context) -> pbf::Feature {
    let mut tags = Vec::new();
    for (key, raw) in feature.properties() {
        // null values are dropped; their key is not interned either
        let Some(value) = Value::from_json(raw) else {
            continue;
        };
        tags.push(context.key_index(key));
        tags.push(context.value_index(value));
    }

    let geom_type = feature.geom_type();
    pbf::Feature {
        id: feature.id(),
        tags,
        type_pb: geom_type,
        geometry: encode_geometry(geom_type, &feature.load_geometry()),
    }
}

fn encode_layer<L: EncodableLayer>(layer: &L) -> pbf::Layer {
    let mut context = Context::default();
    let count = layer.feature_count();
    let mut features = Vec::with_capacity(count);
    for index in 0..count {
        let feature = layer.feature(index);
        features.push(encode_feature(&feature, &mut context));
    }
    debug!(
        "encoded layer {:?}: {} features, {} keys, {} values",
        layer.name(),
        features.len(),
        context.keys.len(),
        context.values.len()
    );

    let version = layer.version();
    let extent = layer.extent();
    pbf::Layer {
        version: if version == 0 { DEFAULT_VERSION } else { version },
        name: layer.name().to_owned(),
        features,
        keys: context.keys,
        values: context.values.into_iter().map(pbf::Value::from).collect(),
        extent: if extent == 0 { DEFAULT_EXTENT } else { extent },
    }
}

impl From<Value> for pbf::Value {
    fn from(value: Value) -> pbf::Value {
        let mut out = pbf::Value::default();
        match value {
            Value::String(v) => out.string_value = Some(v),
            Value::Double(v) => out.double_value = Some(v),
            Value::Uint(v) => out.uint_value = Some(v),
            Value::Sint(v) => out.sint_value = Some(v),
            Value::Bool(v) => out.bool_value = Some(v),
        }
        out
    }
}

/// Serializes layers into one MVT tile message, one layer sub-message per
/// entry, in input order.
pub fn encode_layers<L: EncodableLayer>(layers: &[L]) -> Result<Vec<u8>, EncodeError> {
    let tile = pbf::Tile {
        layers: layers.iter().map(encode_layer).collect(),
    };

    let mut out = Vec::with_capacity(tile.get_size());
    let mut writer = Writer::new(&mut out);
    tile.write_message(&mut writer)?;
    trace!("encoded tile: {} layers, {} bytes", layers.len(), out.len());
    Ok(out)
}

/// A tile assembled from owned layers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tile {
    layers: Vec<Layer>,
}

impl Tile {
    /// Layer names must be unique within a tile.
    pub fn new(layers: Vec<Layer>) -> Result<Tile, EncodeError> {
        let mut names = HashSet::with_capacity(layers.len());
        for layer in &layers {
            if !names.insert(layer.name.as_str()) {
                return Err(EncodeError::DuplicateLayerName(layer.name.clone()));
            }
        }
        Ok(Tile { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode_layers(&self.layers)
    }
}

/// An owned layer: the passthrough implementation of [`EncodableLayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    pub version: u32,
    pub extent: u32,
    features: Vec<Feature>,
}

impl Layer {
    pub fn new<Name>(name: Name, features: Vec<Feature>) -> Layer
    where
        Name: Into<String>,
    {
        Layer {
            name: name.into(),
            version: DEFAULT_VERSION,
            extent: DEFAULT_EXTENT,
            features,
        }
    }
}

impl EncodableLayer for Layer {
    type Feature<'a>
        = &'a Feature
    where
        Self: 'a;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn extent(&self) -> u32 {
        self.extent
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn feature(&self, index: usize) -> &Feature {
        &self.features[index]
    }
}

/// An owned feature with geometry already in layer-extent space.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<u64>,
    geom_type: GeomType,
    properties: Map<String, JsonValue>,
    geometry: Vec<Ring>,
}

impl Feature {
    pub fn new(geom_type: GeomType, geometry: Vec<Ring>) -> Feature {
        Feature {
            id: None,
            geom_type,
            properties: Map::new(),
            geometry,
        }
    }

    /// Adds one attribute; inserting an existing key keeps the last value.
    pub fn add_property<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<JsonValue>,
    {
        self.properties.insert(key.into(), value.into());
    }
}

impl EncodableFeature for Feature {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn geom_type(&self) -> GeomType {
        self.geom_type
    }

    fn properties(&self) -> &Map<String, JsonValue> {
        &self.properties
    }

    fn load_geometry(&self) -> Vec<Ring> {
        self.geometry.clone()
    }
}

#[cfg(test)]
mod mvt_writer_test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use quick_protobuf::{BytesReader, MessageRead};

    fn decode(bytes: &[u8]) -> pbf::Tile {
        let mut reader = BytesReader::from_bytes(bytes);
        pbf::Tile::from_reader(&mut reader, bytes).unwrap()
    }

    fn encode_single(layer: Layer) -> pbf::Tile {
        let bytes = Tile::new(vec![layer]).unwrap().encode().unwrap();
        decode(&bytes)
    }

    #[test]
    fn read_back() {
        let mut poi = Feature::new(GeomType::Point, vec![vec![(2048, 2048)]]);
        poi.id = Some(1234);
        poi.add_property("name", "summit");
        poi.add_property("ele", 2203);

        let tile = encode_single(Layer::new("poi", vec![poi]));
        assert_eq!(tile.layers.len(), 1);

        let layer = &tile.layers[0];
        assert_eq!(layer.version, 1);
        assert_eq!(layer.name, "poi");
        assert_eq!(layer.extent, 4096);
        assert_eq!(layer.keys, vec!["name", "ele"]);
        assert_eq!(layer.values[0].string_value.as_deref(), Some("summit"));
        assert_eq!(layer.values[1].uint_value, Some(2203));

        let feature = &layer.features[0];
        assert_eq!(feature.id, Some(1234));
        assert_eq!(feature.type_pb, GeomType::Point);
        assert_eq!(feature.tags, vec![0, 0, 1, 1]);
        assert_eq!(feature.geometry, vec![9, 4096, 4096]);
    }

    #[test]
    fn duplicate_layer_names() {
        let layers = vec![Layer::new("test", vec![]), Layer::new("test", vec![])];
        match Tile::new(layers) {
            Err(EncodeError::DuplicateLayerName(name)) => assert_eq!(name, "test"),
            other => panic!("expected duplicate layer name error, got {other:?}"),
        }
    }

    #[test]
    fn missing_id_writes_no_id_field() {
        let with_id = {
            let mut f = Feature::new(GeomType::Point, vec![vec![(1, 1)]]);
            f.id = Some(7);
            f
        };
        let without_id = Feature::new(GeomType::Point, vec![vec![(2, 2)]]);

        let tile = encode_single(Layer::new("test", vec![with_id, without_id]));
        let features = &tile.layers[0].features;
        assert_eq!(features[0].id, Some(7));
        assert_eq!(features[1].id, None);
    }

    #[test]
    fn value_table_dedup() {
        let mut first = Feature::new(GeomType::Point, vec![vec![(0, 0)]]);
        first.add_property("kind", "tree");
        let mut second = Feature::new(GeomType::Point, vec![vec![(1, 1)]]);
        second.add_property("kind", "tree");

        let tile = encode_single(Layer::new("test", vec![first, second]));
        let layer = &tile.layers[0];
        assert_eq!(layer.keys, vec!["kind"]);
        assert_eq!(layer.values.len(), 1);
        assert_eq!(layer.features[0].tags, vec![0, 0]);
        assert_eq!(layer.features[1].tags, vec![0, 0]);
    }

    #[test]
    fn keys_in_first_seen_order() {
        let mut first = Feature::new(GeomType::Point, vec![vec![(0, 0)]]);
        first.add_property("b", 1);
        first.add_property("a", 2);
        let mut second = Feature::new(GeomType::Point, vec![vec![(1, 1)]]);
        second.add_property("a", 3);
        second.add_property("c", 4);

        let tile = encode_single(Layer::new("test", vec![first, second]));
        assert_eq!(tile.layers[0].keys, vec!["b", "a", "c"]);
        assert_eq!(tile.layers[0].features[1].tags, vec![1, 2, 2, 3]);
    }

    #[test]
    fn null_properties_skipped() {
        let mut feature = Feature::new(GeomType::Point, vec![vec![(0, 0)]]);
        feature.add_property("gone", JsonValue::Null);
        feature.add_property("kept", true);

        let tile = encode_single(Layer::new("test", vec![feature]));
        let layer = &tile.layers[0];
        assert_eq!(layer.keys, vec!["kept"]);
        assert_eq!(layer.values[0].bool_value, Some(true));
        assert_eq!(layer.features[0].tags, vec![0, 0]);
    }

    #[test]
    fn numeric_value_typing() {
        let mut feature = Feature::new(GeomType::Point, vec![vec![(0, 0)]]);
        feature.add_property("large_integer", 39953616224u64);
        feature.add_property("non_integer", 331.75415);
        feature.add_property("below_zero", -5);

        let tile = encode_single(Layer::new("test", vec![feature]));
        let values = &tile.layers[0].values;
        assert_eq!(values[0].uint_value, Some(39953616224));
        assert_approx_eq!(values[1].double_value.unwrap(), 331.75415);
        assert_eq!(values[2].sint_value, Some(-5));
    }

    #[test]
    fn point_geometry() {
        // single point: one MoveTo with one delta pair
        assert_eq!(
            encode_geometry(GeomType::Point, &[vec![(25, 17)]]),
            vec![9, 50, 34]
        );
        // two points share one MoveTo with count 2
        assert_eq!(
            encode_geometry(GeomType::Point, &[vec![(5, 7), (3, 2)]]),
            vec![17, 10, 14, 3, 9]
        );
    }

    #[test]
    fn linestring_geometry() {
        assert_eq!(
            encode_geometry(GeomType::LineString, &[vec![(2, 2), (2, 10), (10, 10)]]),
            vec![9, 4, 4, 18, 0, 16, 16, 0]
        );
    }

    #[test]
    fn multi_ring_cursor_persists() {
        let rings = vec![vec![(2, 2), (2, 10)], vec![(1, 1)]];
        assert_eq!(
            encode_geometry(GeomType::LineString, &rings),
            vec![9, 4, 4, 10, 0, 16, 9, 1, 17]
        );
    }

    #[test]
    fn polygon_geometry() {
        // closed ring of 4 stored points: MoveTo(1) + LineTo(2) + ClosePath(1)
        let ring = vec![(3, 6), (8, 12), (20, 34), (3, 6)];
        assert_eq!(
            encode_geometry(GeomType::Polygon, &[ring]),
            vec![9, 6, 12, 18, 10, 12, 24, 44, 15]
        );
    }

    #[test]
    fn degenerate_rings_emit_only_what_connects() {
        // 2-point closed polygon ring: bare MoveTo, no LineTo, no ClosePath
        assert_eq!(
            encode_geometry(GeomType::Polygon, &[vec![(5, 5), (5, 5)]]),
            vec![9, 10, 10]
        );
        // 1-point polygon ring
        assert_eq!(
            encode_geometry(GeomType::Polygon, &[vec![(5, 5)]]),
            vec![9]
        );
        // empty rings still move
        assert_eq!(encode_geometry(GeomType::LineString, &[vec![]]), vec![9]);
        assert_eq!(encode_geometry(GeomType::Point, &[vec![]]), vec![1]);
    }

    #[test]
    fn zero_version_and_extent_fall_back_to_defaults() {
        let mut layer = Layer::new("test", vec![]);
        layer.version = 0;
        layer.extent = 0;

        let tile = encode_single(layer);
        assert_eq!(tile.layers[0].version, 1);
        assert_eq!(tile.layers[0].extent, 4096);
    }

    #[test]
    fn explicit_version_and_extent_survive() {
        let mut layer = Layer::new("test", vec![]);
        layer.version = 2;
        layer.extent = 8192;

        let tile = encode_single(layer);
        assert_eq!(tile.layers[0].version, 2);
        assert_eq!(tile.layers[0].extent, 8192);
    }

    #[test]
    fn minimal_layer_exact_bytes() {
        let bytes = Tile::new(vec![Layer::new("test", vec![])])
            .unwrap()
            .encode()
            .unwrap();
        assert_eq!(
            bytes,
            vec![
                0x1A, 0x0B, // layers field, 11 bytes
                0x78, 0x01, // version 1
                0x0A, 0x04, b't', b'e', b's', b't', // name
                0x28, 0x80, 0x20, // extent 4096
            ]
        );
    }

    #[test]
    fn empty_feature_still_frames_tags_and_geometry() {
        let feature = Feature::new(GeomType::Unknown, vec![]);
        let bytes = Tile::new(vec![Layer::new("t", vec![feature])])
            .unwrap()
            .encode()
            .unwrap();

        // feature sub-message: empty tags, type 0, empty geometry
        let expected_feature: &[u8] = &[0x12, 0x00, 0x18, 0x00, 0x22, 0x00];
        assert!(bytes
            .windows(expected_feature.len())
            .any(|window| window == expected_feature));

        let tile = decode(&bytes);
        let feature = &tile.layers[0].features[0];
        assert_eq!(feature.type_pb, GeomType::Unknown);
        assert!(feature.tags.is_empty());
        assert!(feature.geometry.is_empty());
    }
}
