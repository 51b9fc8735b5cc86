//! Async transcode pipeline.
//!
//! This module streams every stored image of a source archive through a
//! bounded set of concurrent transcode tasks and into a content-addressed
//! destination archive.
//!
//! # Architecture
//!
//! ```text
//! TileSource → ConcurrencyLimiter → Encode Stage → Digest → Write Stage → destination
//!                                        └──────── ProgressEvent ────────→ ProgressReporter
//! ```
//!
//! # Key Components
//!
//! - [`TranscodeRun`] - drives a run through its [`RunPhase`]s
//! - [`ConcurrencyLimiter`] - bounds in-flight transcodes
//! - [`ProgressReporter`] - single consumer of completion events
//! - [`preflight`] - path checks run before any archive is opened
//!
//! # Example
//!
//! ```ignore
//! use tilesqueeze::config::TranscodeConfig;
//! use tilesqueeze::pipeline::TranscodeRun;
//!
//! let summary = TranscodeRun::new("in.mbtiles", "out.mbtiles", TranscodeConfig::default())
//!     .run()
//!     .await?;
//! ```

mod concurrency_limiter;
mod error;
mod phase;
pub mod preflight;
pub mod progress;
mod runner;
pub mod stages;

pub use concurrency_limiter::{ConcurrencyLimiter, ConcurrencyPermit};
pub use error::{PipelineError, TileError};
pub use phase::RunPhase;
pub use progress::{ItemOutcome, ProgressEvent, ProgressReporter, ProgressSnapshot, RunState};
pub use runner::{RunSummary, TranscodeRun};
