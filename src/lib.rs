//! Encodes vector tile layers into the Mapbox Vector Tile (MVT) binary
//! format.
//!
//! Two input shapes feed one encoding pipeline:
//!
//! - an owned tile object graph ([`Tile`], [`Layer`], [`Feature`]) or any
//!   type implementing the [`EncodableLayer`]/[`EncodableFeature`] traits;
//! - pre-tiled GeoJSON features in pixel space, via the [`geojson`]
//!   adapter and [`from_geojson_layers`].
//!
//! The output is the uncompressed protobuf `Tile` message defined by the
//! MVT specification, byte-stable across runs: layer fields are emitted in
//! a fixed order and the per-layer key/value dictionaries are built in
//! first-seen order.
//!
//! ```
//! use mvt_pbf::{Feature, GeomType, Layer, Tile};
//!
//! let mut feature = Feature::new(GeomType::Point, vec![vec![(2048, 2048)]]);
//! feature.id = Some(1234);
//! feature.add_property("name", "summit");
//!
//! let tile = Tile::new(vec![Layer::new("poi", vec![feature])])?;
//! let bytes = tile.encode()?;
//! # assert!(!bytes.is_empty());
//! # Ok::<(), mvt_pbf::EncodeError>(())
//! ```

pub mod common;
pub mod error;
pub mod geojson;
pub mod proto;
pub mod write;

pub use common::{Ring, TileCoord, Value};
pub use error::EncodeError;
pub use geojson::{
    from_geojson_layers, GeoJsonFeature, GeoJsonGeometry, GeoJsonOptions, GeoJsonWrapper,
};
pub use proto::vector_tile::GeomType;
pub use write::{encode_layers, EncodableFeature, EncodableLayer, Feature, Layer, Tile};
