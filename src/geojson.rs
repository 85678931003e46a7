//! Adapter presenting pre-tiled GeoJSON features (geojson-vt style tiles,
//! pixel-space coordinates) as encodable layers.

use crate::common::Ring;
use crate::error::EncodeError;
use crate::proto::vector_tile::GeomType;
use crate::write::{encode_layers, EncodableFeature, EncodableLayer};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// Layer name used when a GeoJSON-derived tile is encoded on its own.
pub const GEOJSON_LAYER_NAME: &str = "_geojsonTileLayer";

/// Version and extent the pre-tiled features were generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoJsonOptions {
    pub version: u32,
    pub extent: u32,
}

impl Default for GeoJsonOptions {
    fn default() -> Self {
        GeoJsonOptions {
            version: 1,
            extent: 4096,
        }
    }
}

/// One raw feature of a pre-tiled GeoJSON index. Matches the tile feature
/// shape produced by GeoJSON tiling, so a whole feature list can be
/// deserialized straight from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoJsonFeature {
    /// Geometry type, copied verbatim: 1 point, 2 line string, 3 polygon.
    #[serde(rename = "type")]
    pub geom_type: u32,
    pub geometry: GeoJsonGeometry,
    #[serde(default)]
    pub tags: Map<String, JsonValue>,
    /// Raw id. Coerced to an integer id at encoding time when possible,
    /// omitted otherwise.
    #[serde(default)]
    pub id: Option<JsonValue>,
}

/// Point features carry a single run of coordinates; everything else
/// carries a list of rings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeoJsonGeometry {
    Points(Vec<[f64; 2]>),
    Rings(Vec<Vec<[f64; 2]>>),
}

/// Presents raw GeoJSON-derived features as one encodable layer (and, with
/// the sentinel name, as a single-layer tile).
#[derive(Debug, Clone)]
pub struct GeoJsonWrapper {
    name: String,
    version: u32,
    extent: u32,
    features: Vec<GeoJsonFeature>,
}

impl GeoJsonWrapper {
    pub fn new(features: Vec<GeoJsonFeature>, options: GeoJsonOptions) -> GeoJsonWrapper {
        Self::with_name(GEOJSON_LAYER_NAME, features, options)
    }

    pub fn with_name<Name>(
        name: Name,
        features: Vec<GeoJsonFeature>,
        options: GeoJsonOptions,
    ) -> GeoJsonWrapper
    where
        Name: Into<String>,
    {
        GeoJsonWrapper {
            name: name.into(),
            version: options.version,
            extent: options.extent,
            features,
        }
    }

    /// Serializes this layer as a complete single-layer tile.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode_layers(std::slice::from_ref(self))
    }
}

impl EncodableLayer for GeoJsonWrapper {
    type Feature<'a>
        = FeatureWrapper<'a>
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

    fn feature(&self, index: usize) -> FeatureWrapper<'_> {
        FeatureWrapper::new(&self.features[index])
    }
}

/// Adapts one raw feature to the encoder's feature interface.
#[derive(Debug)]
pub struct FeatureWrapper<'a> {
    feature: &'a GeoJsonFeature,
    id: Option<u64>,
}

impl<'a> FeatureWrapper<'a> {
    fn new(feature: &'a GeoJsonFeature) -> FeatureWrapper<'a> {
        // The vector tile spec only supports integer feature ids. A raw id
        // that does not coerce cleanly is left out instead of being
        // written truncated or non-compliant.
        let id = feature.id.as_ref().and_then(coerce_id);
        FeatureWrapper { feature, id }
    }
}

fn coerce_id(id: &JsonValue) -> Option<u64> {
    match id {
        JsonValue::Number(number) => number.as_u64(),
        JsonValue::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn convert_ring(points: &[[f64; 2]]) -> Ring {
    points
        .iter()
        .map(|point| (point[0] as i32, point[1] as i32))
        .collect()
}

impl EncodableFeature for FeatureWrapper<'_> {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn geom_type(&self) -> GeomType {
        GeomType::from(self.feature.geom_type)
    }

    fn properties(&self) -> &Map<String, JsonValue> {
        &self.feature.tags
    }

    fn load_geometry(&self) -> Vec<Ring> {
        match &self.feature.geometry {
            GeoJsonGeometry::Points(points) if points.is_empty() => Vec::new(),
            GeoJsonGeometry::Points(points) => vec![convert_ring(points)],
            GeoJsonGeometry::Rings(rings) => rings.iter().map(|ring| convert_ring(ring)).collect(),
        }
    }
}

/// Serializes a mapping from layer name to raw GeoJSON-derived features as
/// one MVT tile. Layer order follows the iteration order of `layers`.
pub fn from_geojson_layers<I, Name>(
    layers: I,
    options: GeoJsonOptions,
) -> Result<Vec<u8>, EncodeError>
where
    I: IntoIterator<Item = (Name, Vec<GeoJsonFeature>)>,
    Name: Into<String>,
{
    let wrapped: Vec<GeoJsonWrapper> = layers
        .into_iter()
        .map(|(name, features)| GeoJsonWrapper::with_name(name, features, options))
        .collect();
    encode_layers(&wrapped)
}
