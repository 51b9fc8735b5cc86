//! Per-run options that do not affect encoder output.

use super::defaults::DEFAULT_REPORT_INTERVAL;
use tokio_util::sync::CancellationToken;

/// Options controlling how a run is driven and observed.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip the upfront `COUNT(*)` of source tiles (faster start on huge
    /// archives; progress then has no total or ETA)
    pub skip_upfront_count: bool,

    /// Replace an existing destination instead of refusing to run
    pub overwrite: bool,

    /// Completions between progress reports
    pub report_interval: u64,

    /// Cancelled on shutdown; stops admission and abandons in-flight encodes
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn with_skip_upfront_count(mut self, skip: bool) -> Self {
        self.skip_upfront_count = skip;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the report cadence. Zero is treated as one.
    pub fn with_report_interval(mut self, interval: u64) -> Self {
        self.report_interval = interval.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_upfront_count: false,
            overwrite: false,
            report_interval: DEFAULT_REPORT_INTERVAL,
            cancellation: CancellationToken::new(),
        }
    }
}
