//! Post-transcode checks and storage optimisation.

use crate::archive::ArchiveError;
use rusqlite::Connection;
use tracing::{debug, warn};

/// Count `map` rows whose digest has no matching image.
pub fn count_dangling_references(conn: &Connection) -> Result<u64, ArchiveError> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM main.map AS m
         WHERE NOT EXISTS (SELECT 1 FROM main.images AS i WHERE i.tile_id = m.tile_id)",
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Number of distinct stored images.
pub fn count_images(conn: &Connection) -> Result<u64, ArchiveError> {
    let count: i64 = conn.query_row("SELECT count(*) FROM main.images", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Refresh statistics, compact, and fold the WAL into the main file.
///
/// Each step runs even if an earlier one fails. Failures are returned as
/// messages; the archive stays usable without these steps.
pub fn optimize(conn: &Connection) -> Vec<String> {
    let steps = [
        ("analyze", "ANALYZE"),
        ("vacuum", "VACUUM"),
        ("checkpoint", "PRAGMA wal_checkpoint(TRUNCATE)"),
    ];

    let mut warnings = Vec::new();
    for (step, sql) in steps {
        // wal_checkpoint returns a row, so use a batch for every step
        match conn.execute_batch(sql) {
            Ok(()) => debug!(step, "Optimisation step complete"),
            Err(e) => {
                warn!(step, error = %e, "Optimisation step failed");
                warnings.push(format!("{}: {}", step, e));
            }
        }
    }
    warnings
}
