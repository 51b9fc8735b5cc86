//! Tile archive layouts.
//!
//! Two source layouts are recognised:
//!
//! ```text
//! Deduplicated:  map(zoom_level, tile_column, tile_row, tile_id, grid_id)
//!                images(tile_data, tile_id)
//!                tiles = VIEW map ⋈ images
//!
//! Flat:          tiles(zoom_level, tile_column, tile_row, tile_data)
//! ```
//!
//! The destination is always written in the deduplicated layout, with
//! `tile_id` holding the hex digest of the image bytes.

use crate::archive::tile::TileCoord;
use crate::archive::ArchiveError;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;

/// Reference table name.
pub const MAP_TABLE: &str = "map";

/// Content-addressed image table name.
pub const IMAGES_TABLE: &str = "images";

/// Flat tile table (or, in the destination, the compatibility view).
pub const TILES_TABLE: &str = "tiles";

/// Canonical deduplicated tables, created when the source is flat.
pub(crate) const CANONICAL_TABLES: &str = "
CREATE TABLE map (
    zoom_level INTEGER,
    tile_column INTEGER,
    tile_row INTEGER,
    tile_id TEXT,
    grid_id TEXT
);
CREATE TABLE images (
    tile_data BLOB,
    tile_id TEXT
);
";

/// Canonical indexes and the `tiles` view clients read through.
pub(crate) const CANONICAL_OBJECTS: &str = "
CREATE UNIQUE INDEX map_index ON map (zoom_level, tile_column, tile_row);
CREATE UNIQUE INDEX images_id ON images (tile_id);
CREATE VIEW tiles AS
    SELECT
        map.zoom_level AS zoom_level,
        map.tile_column AS tile_column,
        map.tile_row AS tile_row,
        images.tile_data AS tile_data
    FROM map
    JOIN images ON images.tile_id = map.tile_id;
";

/// Which table pair owns the tile images in a source archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLayout {
    /// `map` + `images`; references are rewritten in place
    Deduplicated,
    /// Single `tiles` table; references are created per tile
    Flat,
}

impl TileLayout {
    /// Inspect a catalog and decide its layout.
    ///
    /// The deduplicated layout wins when both are present, since a `tiles`
    /// table alongside `map`/`images` is not a valid archive of either kind.
    pub fn detect(conn: &Connection) -> Result<Self, ArchiveError> {
        let tables = table_names(conn)?;

        if tables.contains(MAP_TABLE) && tables.contains(IMAGES_TABLE) {
            require_columns(conn, MAP_TABLE, &["tile_id"])?;
            require_columns(conn, IMAGES_TABLE, &["tile_id", "tile_data"])?;
            return Ok(TileLayout::Deduplicated);
        }

        if tables.contains(TILES_TABLE) {
            require_columns(
                conn,
                TILES_TABLE,
                &["zoom_level", "tile_column", "tile_row", "tile_data"],
            )?;
            // Each flat row becomes one unique map row, so coordinates must not repeat
            if let Some(coord) = repeated_coordinate(conn)? {
                return Err(ArchiveError::UnsupportedLayout(format!(
                    "tiles table holds more than one row for {}",
                    coord
                )));
            }
            return Ok(TileLayout::Flat);
        }

        Err(ArchiveError::UnsupportedLayout(
            "expected either map and images tables or a tiles table".to_string(),
        ))
    }

    /// Source table the tile images are read from.
    pub fn image_source_table(&self) -> &'static str {
        match self {
            TileLayout::Deduplicated => IMAGES_TABLE,
            TileLayout::Flat => TILES_TABLE,
        }
    }

    /// Whether a source table is replaced by the transcode rather than copied.
    pub fn is_transformed_table(&self, table: &str) -> bool {
        table == self.image_source_table()
    }

    pub fn name(&self) -> &'static str {
        match self {
            TileLayout::Deduplicated => "deduplicated",
            TileLayout::Flat => "flat",
        }
    }
}

/// Names of all ordinary tables in the catalog.
pub fn table_names(conn: &Connection) -> Result<HashSet<String>, ArchiveError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(names)
}

/// Lower-cased column names of a table.
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, ArchiveError> {
    let quoted = super::ident::quote_identifier(table)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .map(|name| name.map(|n| n.to_lowercase()))
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(columns)
}

/// First coordinate that appears on more than one `tiles` row, if any.
///
/// Rows with a non-integer coordinate are left to the per-tile read.
fn repeated_coordinate(conn: &Connection) -> Result<Option<TileCoord>, ArchiveError> {
    let coord = conn
        .query_row(
            "SELECT zoom_level, tile_column, tile_row FROM tiles
             WHERE typeof(zoom_level) = 'integer'
               AND typeof(tile_column) = 'integer'
               AND typeof(tile_row) = 'integer'
             GROUP BY zoom_level, tile_column, tile_row
             HAVING count(*) > 1
             LIMIT 1",
            [],
            |row| {
                Ok(TileCoord {
                    zoom: row.get(0)?,
                    column: row.get(1)?,
                    row: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(coord)
}

fn require_columns(conn: &Connection, table: &str, required: &[&str]) -> Result<(), ArchiveError> {
    let columns = table_columns(conn, table)?;
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !columns.contains(*c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ArchiveError::UnsupportedLayout(format!(
            "table '{}' is missing column(s): {}",
            table,
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_detect_deduplicated() {
        let conn = memory();
        conn.execute_batch(CANONICAL_TABLES).unwrap();
        assert_eq!(TileLayout::detect(&conn).unwrap(), TileLayout::Deduplicated);
    }

    #[test]
    fn test_detect_flat() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);",
        )
        .unwrap();
        assert_eq!(TileLayout::detect(&conn).unwrap(), TileLayout::Flat);
    }

    #[test]
    fn test_detect_rejects_repeated_flat_coordinate() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
             INSERT INTO tiles VALUES (0, 0, 0, x'01'), (0, 0, 0, x'02'), (1, 0, 0, x'03');",
        )
        .unwrap();

        let err = TileLayout::detect(&conn).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedLayout(_)));
        assert!(err.to_string().contains("0/0/0"));
    }

    #[test]
    fn test_detect_ignores_unreadable_coordinates_when_checking_repeats() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
             INSERT INTO tiles VALUES (NULL, 0, 0, x'01'), (NULL, 0, 0, x'02'), (1, 0, 0, x'03');",
        )
        .unwrap();
        assert_eq!(TileLayout::detect(&conn).unwrap(), TileLayout::Flat);
    }

    #[test]
    fn test_detect_rejects_unknown() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE metadata (name TEXT, value TEXT);")
            .unwrap();
        assert!(matches!(
            TileLayout::detect(&conn),
            Err(ArchiveError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_detect_reports_missing_columns() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE tiles (zoom_level INTEGER, tile_data BLOB);")
            .unwrap();
        let err = TileLayout::detect(&conn).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("tile_column"));
        assert!(msg.contains("tile_row"));
    }

    #[test]
    fn test_transformed_table() {
        assert!(TileLayout::Deduplicated.is_transformed_table("images"));
        assert!(!TileLayout::Deduplicated.is_transformed_table("map"));
        assert!(TileLayout::Flat.is_transformed_table("tiles"));
        assert!(!TileLayout::Flat.is_transformed_table("metadata"));
    }

    #[test]
    fn test_canonical_view_resolves() {
        let conn = memory();
        conn.execute_batch(CANONICAL_TABLES).unwrap();
        conn.execute_batch(CANONICAL_OBJECTS).unwrap();
        conn.execute_batch(
            "INSERT INTO images VALUES (x'01', 'a');
             INSERT INTO map VALUES (1, 2, 3, 'a', NULL);",
        )
        .unwrap();

        let data: Vec<u8> = conn
            .query_row(
                "SELECT tile_data FROM tiles WHERE zoom_level = 1 AND tile_column = 2 AND tile_row = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(data, vec![1]);
    }
}
