//! INI configuration file handling.
//!
//! A config file is optional; every setting it can hold also has a default
//! and a command-line flag. Parsing lives in [`super::parser`].
//!
//! ```ini
//! [transcode]
//! quality = 75
//! alpha_quality = 100
//! method = 4
//! concurrency = 8
//!
//! [progress]
//! report_interval = 100
//! skip_count = false
//!
//! [logging]
//! file = logs/tilesqueeze.log
//! ```

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::DEFAULT_REPORT_INTERVAL;
use super::TranscodeConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Config file path given explicitly but missing
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[progress]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSettings {
    pub report_interval: u64,
    pub skip_count: bool,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            report_interval: DEFAULT_REPORT_INTERVAL,
            skip_count: false,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Optional log file in addition to stderr
    pub file: Option<PathBuf>,
}

/// Settings loaded from a config file, layered over defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub transcode: TranscodeConfig,
    pub progress: ProgressSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from a specific path.
    ///
    /// Unlike [`load_or_default`](Self::load_or_default) a missing file is an
    /// error, since the caller named it explicitly.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.is_file() {
            return Err(ConfigFileError::NotFound(path.to_path_buf()));
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Load from `path` when given, otherwise return defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }
}
