use thiserror::Error;

/// Failures that can occur while serializing a tile.
///
/// Well-formed input cannot fail: null properties are dropped, uncoercible
/// feature ids are omitted and degenerate rings degrade to the commands
/// that still make sense. What remains is a wire-layer failure and the one
/// structural rule the encoder enforces itself.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The underlying protobuf writer failed. Not expected in normal
    /// operation; indicates a broken writer contract.
    #[error("protobuf write failed: {0}")]
    Write(#[from] quick_protobuf::Error),

    /// 4.1. Layers: a Vector Tile MUST NOT contain two or more layers
    /// whose name values are byte-for-byte identical.
    #[error("duplicate layer name: {0}")]
    DuplicateLayerName(String),
}
