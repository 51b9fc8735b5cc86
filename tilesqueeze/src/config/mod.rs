//! Configuration types for tilesqueeze runs.
//!
//! - [`TranscodeConfig`] - encoder settings and the concurrency bound
//! - [`RunOptions`] - progress cadence, upfront count, cancellation
//! - [`ConfigFile`] - optional INI file layered over the defaults
//!
//! # Example
//!
//! ```
//! use tilesqueeze::config::{RunOptions, TranscodeConfig};
//!
//! let config = TranscodeConfig::default().with_quality(70).with_method(6);
//! let options = RunOptions::default().with_skip_upfront_count(true);
//! assert!(config.validate().is_ok());
//! assert!(options.skip_upfront_count);
//! ```

pub mod defaults;
mod error;
mod file;
mod parser;
mod run;
mod transcode;

pub use error::ConfigError;
pub use file::{ConfigFile, ConfigFileError, LoggingSettings, ProgressSettings};
pub use run::RunOptions;
pub use transcode::TranscodeConfig;
