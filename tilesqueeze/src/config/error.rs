//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// A run configuration or path that cannot be used.
///
/// These are always detected before any archive is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting is outside its allowed range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// Source archive does not exist
    #[error("source archive not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Source path exists but is not a regular file
    #[error("source is not a regular file: {}", .0.display())]
    SourceNotFile(PathBuf),

    /// Destination already exists and overwrite was not requested
    #[error("destination already exists: {} (pass --overwrite to replace it)", .0.display())]
    DestinationExists(PathBuf),

    /// Source and destination resolve to the same file
    #[error("source and destination are the same file: {}", .0.display())]
    SameFile(PathBuf),

    /// Filesystem error while preparing paths
    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
