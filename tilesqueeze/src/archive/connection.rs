//! Opening the source and destination archives.

use crate::archive::ArchiveError;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Open a source archive read-only.
///
/// Any number of read-only connections may be open on the same source at
/// once; each reader gets its own.
pub fn open_source(path: &Path) -> Result<Connection, ArchiveError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    // Fails fast on files that are not SQLite databases
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(conn)
}

/// The destination archive, owned exclusively by one run.
///
/// All writes go through a single connection guarded by a mutex, so every
/// per-item transaction commits in isolation from the others.
pub struct DestinationArchive {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl DestinationArchive {
    /// Create (or open) the destination and configure write-ahead logging.
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = OFF;",
        )?;

        debug!(path = %path.display(), "Destination archive opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Path of the destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive access to the destination connection.
    ///
    /// Blocking; call from `spawn_blocking` when on the async runtime.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, ArchiveError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ArchiveError>,
    {
        let mut conn = self.conn.lock().map_err(|_| ArchiveError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Close the connection, checkpointing the WAL into the main file.
    pub fn close(self) -> Result<(), ArchiveError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| ArchiveError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| ArchiveError::Sqlite(e))
    }
}
