//! Streaming tile reader.
//!
//! Tiles are read on a blocking thread with its own read-only connection and
//! handed over through a bounded channel, so at most `buffer` tiles are held
//! in memory ahead of the consumer.

use crate::archive::connection::open_source;
use crate::archive::layout::TileLayout;
use crate::archive::tile::{SourceTile, TileCoord, TileKey};
use crate::archive::ArchiveError;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type TileResult = Result<SourceTile, ArchiveError>;

/// Count the tiles a run will process.
pub fn count_tiles(conn: &Connection, layout: TileLayout) -> Result<u64, ArchiveError> {
    let sql = format!("SELECT count(*) FROM {}", layout.image_source_table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Lazily yields every stored tile image of a source archive.
///
/// Each image is yielded exactly once. The sequence is finite and not
/// restartable.
pub struct TileSource {
    rx: mpsc::Receiver<TileResult>,
    handle: Option<JoinHandle<()>>,
}

impl TileSource {
    /// Start reading `path` on a blocking thread.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(path: PathBuf, layout: TileLayout, buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::task::spawn_blocking(move || {
            if let Err(e) = read_tiles(&path, layout, &tx) {
                // Receiver may already be gone; nothing else to do then
                let _ = tx.blocking_send(Err(e));
            }
        });
        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Next tile, or `None` once the source is exhausted.
    ///
    /// A row that cannot be read as a tile is yielded as
    /// [`ArchiveError::MalformedTile`] and reading continues. Any other read
    /// error is yielded once and ends the sequence.
    pub async fn next(&mut self) -> Option<TileResult> {
        self.rx.recv().await
    }

    /// Stop reading and wait for the reader thread to exit.
    pub async fn close(mut self) {
        self.rx.close();
        // Drain anything buffered so a blocked sender wakes up
        while self.rx.recv().await.is_some() {}
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Tile reader task ended abnormally");
            }
        }
    }
}

fn read_tiles(
    path: &std::path::Path,
    layout: TileLayout,
    tx: &mpsc::Sender<TileResult>,
) -> Result<(), ArchiveError> {
    let conn = open_source(path)?;
    let sql = match layout {
        TileLayout::Deduplicated => "SELECT tile_id, tile_data FROM images",
        TileLayout::Flat => "SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles",
    };

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut sent = 0u64;
    let mut malformed = 0u64;

    while let Some(row) = rows.next()? {
        let position = sent + malformed;
        let item = match layout {
            TileLayout::Deduplicated => image_row(row),
            TileLayout::Flat => flat_row(row),
        };
        // The row was stepped already; a failed read here is a bad column value
        let item = item.map_err(|e| {
            malformed += 1;
            ArchiveError::MalformedTile {
                position,
                reason: e.to_string(),
            }
        });
        if item.is_ok() {
            sent += 1;
        }
        if tx.blocking_send(item).is_err() {
            debug!(sent, "Tile consumer stopped; ending read");
            return Ok(());
        }
    }

    debug!(sent, malformed, layout = layout.name(), "Tile source exhausted");
    Ok(())
}

fn image_row(row: &Row<'_>) -> rusqlite::Result<SourceTile> {
    let id: Value = row.get(0)?;
    let data: Value = row.get(1)?;
    Ok(SourceTile {
        key: TileKey::Image(id),
        data: value_bytes(data),
    })
}

fn flat_row(row: &Row<'_>) -> rusqlite::Result<SourceTile> {
    let coord = TileCoord {
        zoom: row.get(0)?,
        column: row.get(1)?,
        row: row.get(2)?,
    };
    let data: Value = row.get(3)?;
    Ok(SourceTile {
        key: TileKey::Coord(coord),
        data: value_bytes(data),
    })
}

/// Stored image payload as bytes; NULL becomes empty.
fn value_bytes(value: Value) -> Vec<u8> {
    match value {
        Value::Blob(bytes) => bytes,
        Value::Text(text) => text.into_bytes(),
        Value::Null => Vec::new(),
        Value::Integer(i) => i.to_string().into_bytes(),
        Value::Real(r) => r.to_string().into_bytes(),
    }
}
