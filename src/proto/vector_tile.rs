//! Hand-maintained quick-protobuf messages for the `vector_tile.proto`
//! schema (Mapbox Vector Tile 2.1).
//!
//! The write side emits layer fields in the canonical encoder order
//! (version, name, extent, then features, keys, values) and frames the
//! `tags` and `geometry` sub-messages even when empty, so the produced
//! byte stream is stable for consumers that compare tiles byte-for-byte.
//! The read side accepts any field order, as protobuf requires, and is
//! used by the test suite to verify encoded tiles by reading them back.

use quick_protobuf::sizeofs::*;
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result, Writer, WriterBackend};

/// Geometry type of a feature, as stored in the `type` field.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub enum GeomType {
    #[default]
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl From<i32> for GeomType {
    fn from(value: i32) -> Self {
        match value {
            1 => GeomType::Point,
            2 => GeomType::LineString,
            3 => GeomType::Polygon,
            _ => GeomType::Unknown,
        }
    }
}

impl From<u32> for GeomType {
    fn from(value: u32) -> Self {
        GeomType::from(value as i32)
    }
}

/// A typed attribute value. Exactly one field is set on the write path;
/// `float_value` and `int_value` are part of the schema and readable but
/// never produced by the encoder.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Value {
    pub string_value: Option<String>,
    pub float_value: Option<f32>,
    pub double_value: Option<f64>,
    pub int_value: Option<i64>,
    pub uint_value: Option<u64>,
    pub sint_value: Option<i64>,
    pub bool_value: Option<bool>,
}

impl MessageWrite for Value {
    fn get_size(&self) -> usize {
        self.string_value
            .as_ref()
            .map_or(0, |m| 1 + sizeof_len(m.len()))
            + self.float_value.map_or(0, |_| 1 + 4)
            + self.double_value.map_or(0, |_| 1 + 8)
            + self.int_value.map_or(0, |m| 1 + sizeof_varint(m as u64))
            + self.uint_value.map_or(0, |m| 1 + sizeof_varint(m))
            + self.sint_value.map_or(0, |m| 1 + sizeof_sint64(m))
            + self.bool_value.map_or(0, |m| 1 + sizeof_varint(m as u64))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        if let Some(ref v) = self.string_value {
            w.write_with_tag(10, |w| w.write_string(v))?;
        }
        if let Some(v) = self.float_value {
            w.write_with_tag(21, |w| w.write_float(v))?;
        }
        if let Some(v) = self.double_value {
            w.write_with_tag(25, |w| w.write_double(v))?;
        }
        if let Some(v) = self.int_value {
            w.write_with_tag(32, |w| w.write_int64(v))?;
        }
        if let Some(v) = self.uint_value {
            w.write_with_tag(40, |w| w.write_uint64(v))?;
        }
        if let Some(v) = self.sint_value {
            w.write_with_tag(48, |w| w.write_sint64(v))?;
        }
        if let Some(v) = self.bool_value {
            w.write_with_tag(56, |w| w.write_bool(v))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for Value {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.string_value = Some(r.read_string(bytes)?.to_owned()),
                Ok(21) => msg.float_value = Some(r.read_float(bytes)?),
                Ok(25) => msg.double_value = Some(r.read_double(bytes)?),
                Ok(32) => msg.int_value = Some(r.read_int64(bytes)?),
                Ok(40) => msg.uint_value = Some(r.read_uint64(bytes)?),
                Ok(48) => msg.sint_value = Some(r.read_sint64(bytes)?),
                Ok(56) => msg.bool_value = Some(r.read_bool(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

/// One feature: optional id, packed key/value index pairs, geometry type
/// and the packed command stream.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Feature {
    pub id: Option<u64>,
    pub tags: Vec<u32>,
    pub type_pb: GeomType,
    pub geometry: Vec<u32>,
}

impl Feature {
    fn tags_size(&self) -> usize {
        self.tags.iter().map(|t| sizeof_varint(*t as u64)).sum()
    }

    fn geometry_size(&self) -> usize {
        self.geometry.iter().map(|g| sizeof_varint(*g as u64)).sum()
    }
}

impl MessageWrite for Feature {
    fn get_size(&self) -> usize {
        self.id.map_or(0, |id| 1 + sizeof_varint(id))
            + 1
            + sizeof_len(self.tags_size())
            + 1
            + sizeof_varint(self.type_pb as u64)
            + 1
            + sizeof_len(self.geometry_size())
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        if let Some(id) = self.id {
            w.write_with_tag(8, |w| w.write_uint64(id))?;
        }
        w.write_tag(18)?;
        w.write_varint(self.tags_size() as u64)?;
        for t in &self.tags {
            w.write_varint(*t as u64)?;
        }
        w.write_with_tag(24, |w| w.write_enum(self.type_pb as i32))?;
        w.write_tag(34)?;
        w.write_varint(self.geometry_size() as u64)?;
        for g in &self.geometry {
            w.write_varint(*g as u64)?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for Feature {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.id = Some(r.read_uint64(bytes)?),
                Ok(18) => msg.tags = r.read_packed(bytes, |r, bytes| r.read_uint32(bytes))?,
                Ok(24) => msg.type_pb = r.read_enum(bytes)?,
                Ok(34) => msg.geometry = r.read_packed(bytes, |r, bytes| r.read_uint32(bytes))?,
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

/// One named layer with its feature stream and key/value dictionaries.
#[derive(Debug, PartialEq, Clone)]
pub struct Layer {
    pub version: u32,
    pub name: String,
    pub features: Vec<Feature>,
    pub keys: Vec<String>,
    pub values: Vec<Value>,
    pub extent: u32,
}

impl Default for Layer {
    fn default() -> Self {
        Layer {
            version: 1,
            name: String::new(),
            features: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
            extent: 4096,
        }
    }
}

impl MessageWrite for Layer {
    fn get_size(&self) -> usize {
        1 + sizeof_varint(self.version as u64)
            + 1
            + sizeof_len(self.name.len())
            + 1
            + sizeof_varint(self.extent as u64)
            + self
                .features
                .iter()
                .map(|f| 1 + sizeof_len(f.get_size()))
                .sum::<usize>()
            + self
                .keys
                .iter()
                .map(|k| 1 + sizeof_len(k.len()))
                .sum::<usize>()
            + self
                .values
                .iter()
                .map(|v| 1 + sizeof_len(v.get_size()))
                .sum::<usize>()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_with_tag(120, |w| w.write_uint32(self.version))?;
        w.write_with_tag(10, |w| w.write_string(&self.name))?;
        w.write_with_tag(40, |w| w.write_uint32(self.extent))?;
        for f in &self.features {
            w.write_with_tag(18, |w| w.write_message(f))?;
        }
        for k in &self.keys {
            w.write_with_tag(26, |w| w.write_string(k))?;
        }
        for v in &self.values {
            w.write_with_tag(34, |w| w.write_message(v))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for Layer {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(120) => msg.version = r.read_uint32(bytes)?,
                Ok(10) => msg.name = r.read_string(bytes)?.to_owned(),
                Ok(18) => msg.features.push(r.read_message::<Feature>(bytes)?),
                Ok(26) => msg.keys.push(r.read_string(bytes)?.to_owned()),
                Ok(34) => msg.values.push(r.read_message::<Value>(bytes)?),
                Ok(40) => msg.extent = r.read_uint32(bytes)?,
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

/// The top-level tile message: a sequence of layers.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Tile {
    pub layers: Vec<Layer>,
}

impl MessageWrite for Tile {
    fn get_size(&self) -> usize {
        self.layers
            .iter()
            .map(|l| 1 + sizeof_len(l.get_size()))
            .sum()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        for l in &self.layers {
            w.write_with_tag(26, |w| w.write_message(l))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for Tile {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(26) => msg.layers.push(r.read_message::<Layer>(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}
