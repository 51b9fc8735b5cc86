//! Tile identity as read from the source archive.

use rusqlite::types::Value;
use std::fmt;

/// Zoom/column/row address of a tile (TMS row order, as stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub zoom: i64,
    pub column: i64,
    pub row: i64,
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.column, self.row)
    }
}

/// How a source tile is identified.
///
/// In a deduplicated source the image row owns the tile and is known by its
/// stored id; in a flat source each tile is known by its coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum TileKey {
    /// `images.tile_id` of a deduplicated source
    Image(Value),
    /// Coordinate of a flat source's `tiles` row
    Coord(TileCoord),
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileKey::Image(Value::Text(id)) => write!(f, "image {}", id),
            TileKey::Image(Value::Integer(id)) => write!(f, "image {}", id),
            TileKey::Image(Value::Real(id)) => write!(f, "image {}", id),
            TileKey::Image(Value::Blob(id)) => write!(f, "image <{} byte blob>", id.len()),
            TileKey::Image(Value::Null) => write!(f, "image NULL"),
            TileKey::Coord(coord) => write!(f, "tile {}", coord),
        }
    }
}

/// One stored image read from the source archive.
#[derive(Debug, Clone)]
pub struct SourceTile {
    pub key: TileKey,
    pub data: Vec<u8>,
}
