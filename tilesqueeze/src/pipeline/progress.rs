//! Progress reporting.
//!
//! Transcode tasks send one [`ProgressEvent`] per completed item. A single
//! reporter task consumes them, is the only writer of the [`RunState`]
//! counters, and logs a [`ProgressSnapshot`] every `report_interval`
//! completions. Nothing in the pipeline reads these counters for
//! correctness.

use crate::archive::WriteOutcome;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How an item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Transcoded and stored
    Stored(WriteOutcome),
    /// Counted as failed (its reference still resolves or is unchanged)
    Failed,
}

/// Completion of one item.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub outcome: ItemOutcome,
    /// Time from admission to completion
    pub elapsed: Duration,
}

/// Counters for one run.
///
/// `processed` counts every completed item, `failed` is the subset that
/// failed. Both only ever increase.
#[derive(Debug, Default)]
pub struct RunState {
    processed: AtomicU64,
    failed: AtomicU64,
    images_inserted: AtomicU64,
    busy_micros: AtomicU64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: &ProgressEvent) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        match event.outcome {
            ItemOutcome::Stored(WriteOutcome::Inserted) => {
                self.images_inserted.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Stored(WriteOutcome::AlreadyPresent) => {}
            ItemOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        let micros = u64::try_from(event.elapsed.as_micros()).unwrap_or(u64::MAX);
        // Saturates instead of wrapping; fetch_update only fails if the closure returns None
        let _ = self
            .busy_micros
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |busy| {
                Some(busy.saturating_add(micros))
            });
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Successful writes that created a new image row.
    pub fn images_inserted(&self) -> u64 {
        self.images_inserted.load(Ordering::Relaxed)
    }

    /// Mean time an item spent in flight.
    pub fn mean_item_time(&self) -> Option<Duration> {
        let processed = self.processed();
        if processed == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.busy_micros.load(Ordering::Relaxed) / processed,
        ))
    }
}

/// Point-in-time view of run progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub failed: u64,
    pub total: Option<u64>,
    pub elapsed: Duration,
    /// Items per second
    pub rate: f64,
    /// Estimated time remaining; needs a known total and a nonzero rate
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn new(processed: u64, failed: u64, total: Option<u64>, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            processed as f64 / secs
        } else {
            0.0
        };
        let eta = match total {
            Some(total) if rate > 0.0 => {
                let remaining = total.saturating_sub(processed);
                Some(Duration::from_secs_f64(remaining as f64 / rate))
            }
            _ => None,
        };

        Self {
            processed,
            failed,
            total,
            elapsed,
            rate,
            eta,
        }
    }

    pub fn from_state(state: &RunState, total: Option<u64>, elapsed: Duration) -> Self {
        Self::new(state.processed(), state.failed(), total, elapsed)
    }

    /// Fraction complete (0.0 - 1.0), when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.processed as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.total, self.fraction()) {
            (Some(total), Some(fraction)) => write!(
                f,
                "{}/{} tiles ({:.1}%)",
                self.processed,
                total,
                fraction * 100.0
            )?,
            _ => write!(f, "{} tiles", self.processed)?,
        }
        write!(f, ", {} failed, {:.1} tiles/s", self.failed, self.rate)?;
        if let Some(eta) = self.eta {
            write!(f, ", ETA {}", format_duration(eta))?;
        }
        Ok(())
    }
}

/// Format a duration as `1h 02m 03s`, `2m 03s` or `3s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Handle for sending completion events.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Background consumer of completion events.
pub struct ProgressReporter {
    tx: ProgressSender,
    handle: JoinHandle<()>,
    state: Arc<RunState>,
}

impl ProgressReporter {
    /// Start the reporter task.
    ///
    /// `total` is the upfront tile count, if one was taken. A snapshot is
    /// logged every `report_interval` completions.
    pub fn spawn(total: Option<u64>, report_interval: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(RunState::new());
        let handle = tokio::spawn(report_loop(
            rx,
            Arc::clone(&state),
            total,
            report_interval.max(1),
        ));

        Self { tx, handle, state }
    }

    pub fn sender(&self) -> ProgressSender {
        self.tx.clone()
    }

    /// Wait for every outstanding event to be counted.
    ///
    /// All senders handed out by [`sender`](Self::sender) must have been
    /// dropped first, or this waits forever.
    pub async fn finish(self) -> Arc<RunState> {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            debug!(error = %e, "Progress reporter ended abnormally");
        }
        self.state
    }
}

async fn report_loop(
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
    state: Arc<RunState>,
    total: Option<u64>,
    report_interval: u64,
) {
    let started = Instant::now();

    while let Some(event) = rx.recv().await {
        state.record(&event);

        if state.processed() % report_interval == 0 {
            let snapshot = ProgressSnapshot::from_state(&state, total, started.elapsed());
            info!(
                processed = snapshot.processed,
                failed = snapshot.failed,
                total = ?snapshot.total,
                "Progress: {}",
                snapshot
            );
        }
    }
}
