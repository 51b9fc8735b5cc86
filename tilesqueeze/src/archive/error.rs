//! Archive access errors.

use thiserror::Error;

/// Errors raised while reading the source or writing the destination archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Storage engine error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Catalog matches neither the deduplicated nor the flat tile layout
    #[error("unsupported archive layout: {0}")]
    UnsupportedLayout(String),

    /// Catalog object name failed the identifier allow-list
    #[error("refusing catalog identifier {0:?}")]
    InvalidIdentifier(String),

    /// Another task panicked while holding the destination connection
    #[error("destination connection lock poisoned")]
    LockPoisoned,

    /// A single source row could not be read as a tile
    #[error("unreadable tile at source row {position}: {reason}")]
    MalformedTile { position: u64, reason: String },
}

impl ArchiveError {
    /// Whether the error concerns one tile only, leaving the rest readable.
    pub fn is_item_error(&self) -> bool {
        matches!(self, ArchiveError::MalformedTile { .. })
    }
}
