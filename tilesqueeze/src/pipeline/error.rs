//! Error types for the transcode pipeline.
//!
//! Errors split by blast radius: a [`TileError`] belongs to one item and is
//! recovered locally, a [`PipelineError`] ends the run.

use crate::archive::{ArchiveError, TileKey};
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::pipeline::RunPhase;
use thiserror::Error;

/// Failure of a single tile. Counted, logged, never fatal.
#[derive(Debug, Error)]
pub enum TileError {
    /// Codec rejected the input
    #[error("{key}: encode failed: {source}")]
    Encode {
        key: TileKey,
        #[source]
        source: CodecError,
    },

    /// Per-item transaction failed and was rolled back
    #[error("{key}: write failed: {source}")]
    Write {
        key: TileKey,
        #[source]
        source: ArchiveError,
    },

    /// Blocking task panicked
    #[error("{key}: {stage} task panicked: {message}")]
    Panicked {
        key: TileKey,
        stage: &'static str,
        message: String,
    },

    /// Run was cancelled while the item was in flight
    #[error("{key}: cancelled")]
    Cancelled { key: TileKey },
}

impl TileError {
    pub fn key(&self) -> &TileKey {
        match self {
            TileError::Encode { key, .. }
            | TileError::Write { key, .. }
            | TileError::Panicked { key, .. }
            | TileError::Cancelled { key } => key,
        }
    }
}

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any archive was touched
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Structural failure; the destination must be discarded
    #[error("{phase} failed: {source}")]
    Structural {
        phase: RunPhase,
        #[source]
        source: ArchiveError,
    },

    /// Run was cancelled before completion
    #[error("run cancelled during {0}")]
    Cancelled(RunPhase),

    /// Unexpected runtime failure (task join, closed limiter)
    #[error("internal error during {phase}: {message}")]
    Internal { phase: RunPhase, message: String },
}

impl PipelineError {
    pub(crate) fn structural(phase: RunPhase) -> impl FnOnce(ArchiveError) -> Self {
        move |source| PipelineError::Structural { phase, source }
    }

    /// Phase the run was in when it failed, if it had started.
    pub fn phase(&self) -> Option<RunPhase> {
        match self {
            PipelineError::Config(_) => None,
            PipelineError::Structural { phase, .. }
            | PipelineError::Cancelled(phase)
            | PipelineError::Internal { phase, .. } => Some(*phase),
        }
    }
}
