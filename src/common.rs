use serde_json::Value as JsonValue;

/// A single point in layer-extent space.
pub type TileCoord = (i32, i32);

/// One contour of a geometry: an ordered run of points.
pub type Ring = Vec<TileCoord>;

/// A scalar attribute value, as stored in a layer's value table.
///
/// The union is closed over what the encoder can emit: strings, doubles,
/// unsigned and signed integers, booleans. Property values arriving as
/// arbitrary JSON are normalized into it with [`Value::from_json`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Double(f64),
    Uint(u64),
    Sint(i64),
    Bool(bool),
}

impl Value {
    /// Normalizes one raw property value for encoding.
    ///
    /// Returns `None` for null, which callers drop entirely. Arrays and
    /// objects are replaced by their compact JSON text. Numbers are
    /// classified by value, not representation, so `1.0` lands in `Uint`
    /// just like `1`.
    pub fn from_json(value: &JsonValue) -> Option<Value> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(Value::Bool(*b)),
            JsonValue::Number(number) => {
                if let Some(u) = number.as_u64() {
                    Some(Value::Uint(u))
                } else if let Some(i) = number.as_i64() {
                    Some(Value::Sint(i))
                } else {
                    Some(Value::from_f64(number.as_f64().unwrap_or(f64::NAN)))
                }
            }
            JsonValue::String(s) => Some(Value::String(s.clone())),
            other => Some(Value::String(other.to_string())),
        }
    }

    /// Classifies a raw double: a non-zero fractional part selects
    /// `Double`, a negative integer selects `Sint`, anything else `Uint`.
    /// Integral values outside u64/i64 range stay doubles instead of
    /// wrapping.
    pub fn from_f64(value: f64) -> Value {
        if value.fract() != 0.0 {
            Value::Double(value)
        } else if value >= 0.0 && value < u64::MAX as f64 {
            Value::Uint(value as u64)
        } else if value < 0.0 && value >= i64::MIN as f64 {
            Value::Sint(value as i64)
        } else {
            Value::Double(value)
        }
    }

    /// Dedup key for the per-layer value table: variant tag plus the
    /// stringified value. Normalization never produces an integral
    /// `Double`, so no two variants can alias through this key.
    pub(crate) fn cache_key(&self) -> String {
        match self {
            Value::String(s) => format!("string:{s}"),
            Value::Double(d) => format!("double:{d}"),
            Value::Uint(u) => format!("uint:{u}"),
            Value::Sint(i) => format!("sint:{i}"),
            Value::Bool(b) => format!("bool:{b}"),
        }
    }
}
