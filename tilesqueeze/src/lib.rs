//! tilesqueeze - tile archive transcoding and deduplication
//!
//! This library re-encodes every image of an MBTiles-style tile archive into
//! lossy WebP and writes a new archive in which byte-identical images are
//! stored once, keyed by the SHA-256 digest of their content.
//!
//! # High-Level API
//!
//! ```ignore
//! use tilesqueeze::config::{RunOptions, TranscodeConfig};
//! use tilesqueeze::pipeline::TranscodeRun;
//!
//! let config = TranscodeConfig::default().with_quality(70);
//! let summary = TranscodeRun::new("in.mbtiles", "out.mbtiles", config)
//!     .with_options(RunOptions::default().with_overwrite(true))
//!     .run()
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`archive`] - SQLite access: schema replication, tile source, dedup writer
//! - [`codec`] - image re-encoding behind the [`codec::TileEncoder`] trait
//! - [`config`] - run configuration and INI file loading
//! - [`digest`] - content addressing
//! - [`pipeline`] - the concurrent orchestrator

pub mod archive;
pub mod codec;
pub mod config;
pub mod digest;
pub mod logging;
pub mod pipeline;

/// Version of the tilesqueeze library and CLI.
///
/// Synchronized across the workspace; injected from `Cargo.toml` at compile
/// time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION.split('.').count(), 3);
    }
}
