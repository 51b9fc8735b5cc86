//! Run lifecycle.
//!
//! ```text
//! Initializing → ReplicatingSchema → BuildingHelperIndex → Transcoding → Finalizing → Done
//!       └──────────────┴────────────────────┴──────────────────┴────────────┴──→ Failed
//! ```

use std::fmt;

/// Phase of a transcode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Initializing,
    ReplicatingSchema,
    BuildingHelperIndex,
    Transcoding,
    Finalizing,
    Done,
    Failed,
}

impl RunPhase {
    /// The phase that follows on success, or `None` for terminal phases.
    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::Initializing => Some(RunPhase::ReplicatingSchema),
            RunPhase::ReplicatingSchema => Some(RunPhase::BuildingHelperIndex),
            RunPhase::BuildingHelperIndex => Some(RunPhase::Transcoding),
            RunPhase::Transcoding => Some(RunPhase::Finalizing),
            RunPhase::Finalizing => Some(RunPhase::Done),
            RunPhase::Done | RunPhase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(self, to: RunPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == RunPhase::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Initializing => "initialization",
            RunPhase::ReplicatingSchema => "schema replication",
            RunPhase::BuildingHelperIndex => "helper index build",
            RunPhase::Transcoding => "transcoding",
            RunPhase::Finalizing => "finalization",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}
