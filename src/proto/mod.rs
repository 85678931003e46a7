//! Wire-level message types for the Mapbox Vector Tile schema.

pub mod vector_tile;
