//! Path checks run before any archive is opened.

use crate::config::ConfigError;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// SQLite sidecar suffixes removed along with an overwritten destination.
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Validate source and destination paths without touching the filesystem.
///
/// - the source must exist and be a regular file
/// - the destination must not exist unless `overwrite` is set
/// - the two must not be the same file
pub fn check_paths(source: &Path, destination: &Path, overwrite: bool) -> Result<(), ConfigError> {
    let meta = match fs::metadata(source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: source.to_path_buf(),
                source: e,
            })
        }
    };
    if !meta.is_file() {
        return Err(ConfigError::SourceNotFile(source.to_path_buf()));
    }

    if destination.exists() {
        if same_file(source, destination) {
            return Err(ConfigError::SameFile(destination.to_path_buf()));
        }
        if !overwrite {
            return Err(ConfigError::DestinationExists(destination.to_path_buf()));
        }
    }

    Ok(())
}

/// Make the destination path ready for a fresh archive.
///
/// Removes an existing file (and its WAL sidecars) when overwriting, and
/// creates the parent directory if absent. Call after [`check_paths`].
pub fn prepare_destination(destination: &Path, overwrite: bool) -> Result<(), ConfigError> {
    if overwrite {
        remove_if_present(destination)?;
        for suffix in SIDECAR_SUFFIXES {
            remove_if_present(&sidecar_path(destination, suffix))?;
        }
    }

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
            debug!(path = %parent.display(), "Created destination directory");
        }
    }

    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> Result<(), ConfigError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed existing file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
