//! Content-addressed writes into the destination archive.
//!
//! Each item is one transaction: insert the image if its digest is new, then
//! point the item's references at that digest. Either both effects land or
//! neither does, so a reference never names a missing image.

use crate::archive::connection::DestinationArchive;
use crate::archive::layout::TileLayout;
use crate::archive::tile::TileKey;
use crate::archive::ArchiveError;
use crate::digest::TileDigest;
use rusqlite::{params, Connection};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Snapshot of the original references, keyed by source image id.
const HELPER_TABLE: &str = "_tilesqueeze_refs";

const BUILD_HELPER: &str = "
CREATE TEMP TABLE _tilesqueeze_refs AS
    SELECT rowid AS ref_rowid, tile_id AS source_id FROM main.map;
CREATE INDEX temp._tilesqueeze_refs_source ON _tilesqueeze_refs (source_id);
";

const INSERT_IMAGE: &str = "
INSERT INTO main.images (tile_id, tile_data)
SELECT ?1, ?2
WHERE NOT EXISTS (SELECT 1 FROM main.images WHERE tile_id = ?1)";

const REWRITE_REFERENCES: &str = "
UPDATE main.map SET tile_id = ?1
WHERE rowid IN (SELECT ref_rowid FROM temp._tilesqueeze_refs WHERE source_id = ?2)";

const INSERT_REFERENCE: &str = "
INSERT INTO main.map (zoom_level, tile_column, tile_row, tile_id)
VALUES (?1, ?2, ?3, ?4)";

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The digest was new; the image row was created
    Inserted,
    /// An image with this digest was already stored
    AlreadyPresent,
}

/// Writes transcoded images and rewrites references.
pub struct DedupWriter {
    dest: Arc<DestinationArchive>,
    layout: TileLayout,
}

impl DedupWriter {
    pub fn new(dest: Arc<DestinationArchive>, layout: TileLayout) -> Self {
        Self { dest, layout }
    }

    /// Snapshot the reference table so per-item rewrites are indexed lookups.
    ///
    /// No-op for a flat source, whose references are created rather than
    /// rewritten.
    #[instrument(skip(self), fields(layout = self.layout.name()))]
    pub fn build_helper(&self) -> Result<(), ArchiveError> {
        if self.layout == TileLayout::Flat {
            return Ok(());
        }
        self.dest.with_connection(|conn| {
            conn.execute_batch(BUILD_HELPER)?;
            let refs: i64 = conn.query_row(
                &format!("SELECT count(*) FROM temp.{}", HELPER_TABLE),
                [],
                |row| row.get(0),
            )?;
            debug!(references = refs, "Reference helper built");
            Ok(())
        })
    }

    /// Drop the helper snapshot, if one was built.
    pub fn drop_helper(&self) -> Result<(), ArchiveError> {
        self.dest.with_connection(|conn| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS temp.{}", HELPER_TABLE))?;
            Ok(())
        })
    }

    /// Store one item atomically.
    ///
    /// Blocking; the caller runs it off the async executor.
    pub fn write(
        &self,
        key: &TileKey,
        digest: &TileDigest,
        data: &[u8],
    ) -> Result<WriteOutcome, ArchiveError> {
        self.dest
            .with_connection(|conn| write_item(conn, key, digest, data))
    }
}

fn write_item(
    conn: &mut Connection,
    key: &TileKey,
    digest: &TileDigest,
    data: &[u8],
) -> Result<WriteOutcome, ArchiveError> {
    // Dropping an uncommitted transaction rolls it back
    let tx = conn.transaction()?;

    let inserted = tx
        .prepare_cached(INSERT_IMAGE)?
        .execute(params![digest, data])?;

    match key {
        TileKey::Image(source_id) => {
            tx.prepare_cached(REWRITE_REFERENCES)?
                .execute(params![digest, source_id])?;
        }
        TileKey::Coord(coord) => {
            tx.prepare_cached(INSERT_REFERENCE)?.execute(params![
                coord.zoom,
                coord.column,
                coord.row,
                digest
            ])?;
        }
    }

    tx.commit()?;

    Ok(if inserted > 0 {
        WriteOutcome::Inserted
    } else {
        WriteOutcome::AlreadyPresent
    })
}
