//! Pipeline orchestration.
//!
//! Drives one run through its phases:
//!
//! ```text
//! Initializing         open source, detect layout, count, create destination
//! ReplicatingSchema    catalog + non-image data, format metadata
//! BuildingHelperIndex  reference snapshot for per-item rewrites
//! Transcoding          source → limiter → encode → digest → write
//! Finalizing           drop helper, integrity check, optimise
//! ```
//!
//! Configuration and paths are checked before any archive is opened.
//! Per-item failures are counted and never end the run.

use crate::archive::{
    self, maintenance, open_source, ArchiveError, DedupWriter, DestinationArchive,
    SchemaReplicator, SourceTile, TileLayout, TileSource, WriteOutcome,
};
use crate::codec::TileEncoder;
use crate::config::{RunOptions, TranscodeConfig};
use crate::digest::TileDigest;
use crate::pipeline::preflight;
use crate::pipeline::progress::{ItemOutcome, ProgressEvent, ProgressReporter, ProgressSender};
use crate::pipeline::stages::{encode_stage, write_stage};
use crate::pipeline::{ConcurrencyLimiter, ConcurrencyPermit, PipelineError, RunPhase, TileError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{spawn_blocking, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Source layout the run read
    pub layout: TileLayout,
    /// Upfront tile count, if taken
    pub total: Option<u64>,
    /// Items completed (including failed ones)
    pub processed: u64,
    /// Items that failed to transcode or write
    pub failed: u64,
    /// Rows in the destination image table
    pub distinct_images: u64,
    /// Reference rows whose digest has no image
    pub dangling_references: u64,
    /// Highest number of items in flight at once
    pub peak_in_flight: usize,
    /// Non-fatal finalisation problems
    pub finalize_warnings: Vec<String>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Items that transcoded and stored cleanly.
    pub fn succeeded(&self) -> u64 {
        self.processed.saturating_sub(self.failed)
    }
}

/// A configured transcode run from one archive to another.
///
/// # Example
///
/// ```ignore
/// use tilesqueeze::codec::WebpTileEncoder;
/// use tilesqueeze::config::{RunOptions, TranscodeConfig};
/// use tilesqueeze::pipeline::TranscodeRun;
/// use std::sync::Arc;
///
/// let config = TranscodeConfig::default().with_quality(70);
/// let summary = TranscodeRun::new("in.mbtiles", "out.mbtiles", config)
///     .with_encoder(Arc::new(WebpTileEncoder::new(&config)))
///     .with_options(RunOptions::default().with_overwrite(true))
///     .run()
///     .await?;
/// println!("{} tiles, {} failed", summary.processed, summary.failed);
/// ```
pub struct TranscodeRun {
    source: PathBuf,
    destination: PathBuf,
    config: TranscodeConfig,
    options: RunOptions,
    encoder: Option<Arc<dyn TileEncoder>>,
}

impl TranscodeRun {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        config: TranscodeConfig,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            config,
            options: RunOptions::default(),
            encoder: None,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a specific encoder instead of lossy WebP from the config.
    pub fn with_encoder(mut self, encoder: Arc<dyn TileEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Execute the run to completion.
    pub async fn run(self) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();

        self.config.validate()?;
        preflight::check_paths(&self.source, &self.destination, self.options.overwrite)?;
        preflight::prepare_destination(&self.destination, self.options.overwrite)?;

        let encoder = self.encoder.clone().unwrap_or_else(|| {
            Arc::new(crate::codec::WebpTileEncoder::new(&self.config)) as Arc<dyn TileEncoder>
        });

        let mut phases = PhaseTracker::new();
        match self.drive(&mut phases, encoder, started).await {
            Ok(summary) => {
                phases.advance(RunPhase::Done);
                Ok(summary)
            }
            Err(e) => {
                error!(phase = %phases.current(), error = %e, "Run failed");
                phases.advance(RunPhase::Failed);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        phases: &mut PhaseTracker,
        encoder: Arc<dyn TileEncoder>,
        started: Instant,
    ) -> Result<RunSummary, PipelineError> {
        info!(
            source = %self.source.display(),
            destination = %self.destination.display(),
            encoder = encoder.name(),
            quality = self.config.quality(),
            alpha_quality = self.config.alpha_quality(),
            method = self.config.method(),
            concurrency = self.config.concurrency(),
            "Starting transcode"
        );

        // Initializing
        let source_path = self.source.clone();
        let dest_path = self.destination.clone();
        let skip_count = self.options.skip_upfront_count;
        let (source, layout, total, dest) = blocking(RunPhase::Initializing, move || {
            let source = open_source(&source_path)?;
            let layout = TileLayout::detect(&source)?;
            let total = if skip_count {
                None
            } else {
                Some(archive::count_tiles(&source, layout)?)
            };
            let dest = DestinationArchive::create(&dest_path)?;
            Ok((source, layout, total, dest))
        })
        .await?;
        let dest = Arc::new(dest);
        info!(layout = layout.name(), total = ?total, "Source opened");
        self.check_cancelled(phases)?;

        // ReplicatingSchema
        phases.advance(RunPhase::ReplicatingSchema);
        let replicate_dest = Arc::clone(&dest);
        let format = encoder.format().to_string();
        blocking(RunPhase::ReplicatingSchema, move || {
            replicate_dest.with_connection(|conn| {
                SchemaReplicator::new(&source, layout).replicate(conn)?;
                if !archive::update_format_metadata(conn, &format)? {
                    debug!("No format metadata entry to update");
                }
                Ok(())
            })
        })
        .await?;
        self.check_cancelled(phases)?;

        // BuildingHelperIndex
        phases.advance(RunPhase::BuildingHelperIndex);
        let writer = Arc::new(DedupWriter::new(Arc::clone(&dest), layout));
        let helper_writer = Arc::clone(&writer);
        blocking(RunPhase::BuildingHelperIndex, move || helper_writer.build_helper()).await?;
        self.check_cancelled(phases)?;

        // Transcoding
        phases.advance(RunPhase::Transcoding);
        let transcoded = self
            .transcode(layout, total, encoder, Arc::clone(&writer))
            .await?;
        info!(
            processed = transcoded.processed,
            failed = transcoded.failed,
            "All tiles transcoded"
        );

        // Finalizing
        phases.advance(RunPhase::Finalizing);
        let finalized = finalize(dest, writer, transcoded.images_inserted).await;

        let summary = RunSummary {
            layout,
            total,
            processed: transcoded.processed,
            failed: transcoded.failed,
            distinct_images: finalized.distinct_images,
            dangling_references: finalized.dangling_references,
            peak_in_flight: transcoded.peak_in_flight,
            finalize_warnings: finalized.warnings,
            elapsed: started.elapsed(),
        };

        info!(
            processed = summary.processed,
            failed = summary.failed,
            distinct_images = summary.distinct_images,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Transcode complete"
        );

        Ok(summary)
    }

    fn check_cancelled(&self, phases: &PhaseTracker) -> Result<(), PipelineError> {
        if self.options.cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled(phases.current()));
        }
        Ok(())
    }

    /// Stream every source tile through the limiter and per-item stages.
    async fn transcode(
        &self,
        layout: TileLayout,
        total: Option<u64>,
        encoder: Arc<dyn TileEncoder>,
        writer: Arc<DedupWriter>,
    ) -> Result<TranscodeTotals, PipelineError> {
        let phase = RunPhase::Transcoding;
        let concurrency = self.config.concurrency();
        let cancel = self.options.cancellation.clone();

        let limiter = ConcurrencyLimiter::new(concurrency, "transcode");
        let reporter = ProgressReporter::spawn(total, self.options.report_interval);
        let progress = reporter.sender();
        let mut source = TileSource::spawn(self.source.clone(), layout, concurrency);
        let mut tasks = JoinSet::new();
        let mut read_error: Option<ArchiveError> = None;
        let mut cancelled = false;

        loop {
            // Admission: wait for a free slot, then for the next tile
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = limiter.acquire() => permit.map_err(|e| PipelineError::Internal {
                    phase,
                    message: e.to_string(),
                })?,
            };

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = source.next() => next,
            };

            let tile = match next {
                Some(Ok(tile)) => tile,
                Some(Err(e)) if e.is_item_error() => {
                    warn!(error = %e, "Skipping unreadable source tile");
                    let _ = progress.send(ProgressEvent {
                        outcome: ItemOutcome::Failed,
                        elapsed: Duration::ZERO,
                    });
                    continue;
                }
                Some(Err(e)) => {
                    read_error = Some(e);
                    break;
                }
                None => break,
            };

            tasks.spawn(process_tile(
                tile,
                Arc::clone(&encoder),
                Arc::clone(&writer),
                progress.clone(),
                cancel.clone(),
                permit,
            ));

            while let Some(joined) = tasks.try_join_next() {
                record_join(joined, &progress);
            }
        }

        if cancelled {
            debug!(
                limiter = limiter.label(),
                in_flight = limiter.in_flight(),
                "Cancelled; waiting for in-flight tiles"
            );
        }

        // Final join: every admitted item completes (or observes cancellation)
        while let Some(joined) = tasks.join_next().await {
            record_join(joined, &progress);
        }

        source.close().await;
        drop(progress);
        let state = reporter.finish().await;

        if let Some(e) = read_error {
            return Err(PipelineError::Structural { phase, source: e });
        }
        if cancelled {
            warn!(
                processed = state.processed(),
                "Run cancelled; destination is incomplete"
            );
            return Err(PipelineError::Cancelled(phase));
        }

        if let Some(mean) = state.mean_item_time() {
            debug!(
                limiter = limiter.label(),
                mean_item_ms = u64::try_from(mean.as_millis()).unwrap_or(u64::MAX),
                peak_in_flight = limiter.peak_in_flight(),
                max_concurrent = limiter.max_concurrent(),
                "Transcode timings"
            );
        }

        Ok(TranscodeTotals {
            processed: state.processed(),
            failed: state.failed(),
            images_inserted: state.images_inserted(),
            peak_in_flight: limiter.peak_in_flight(),
        })
    }
}

struct TranscodeTotals {
    processed: u64,
    failed: u64,
    images_inserted: u64,
    peak_in_flight: usize,
}

struct Finalized {
    distinct_images: u64,
    dangling_references: u64,
    warnings: Vec<String>,
}

/// Logs phase transitions and tracks the current phase.
struct PhaseTracker {
    current: RunPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        debug!(phase = %RunPhase::Initializing, "Entering phase");
        Self {
            current: RunPhase::Initializing,
        }
    }

    fn current(&self) -> RunPhase {
        self.current
    }

    fn advance(&mut self, to: RunPhase) {
        debug_assert!(
            self.current.can_transition_to(to),
            "illegal phase transition {} -> {}",
            self.current,
            to
        );
        debug!(from = %self.current, to = %to, "Entering phase");
        self.current = to;
    }
}

/// Run a blocking archive step, mapping its failure to a structural error.
async fn blocking<T, F>(phase: RunPhase, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal {
            phase,
            message: e.to_string(),
        })?
        .map_err(PipelineError::structural(phase))
}

/// One admitted item, from encode to completion event.
async fn process_tile(
    tile: SourceTile,
    encoder: Arc<dyn TileEncoder>,
    writer: Arc<DedupWriter>,
    progress: ProgressSender,
    cancel: CancellationToken,
    permit: ConcurrencyPermit,
) {
    let _permit = permit;
    let started = Instant::now();

    let outcome = match transcode_tile(tile, encoder, writer, &cancel).await {
        Ok(outcome) => ItemOutcome::Stored(outcome),
        Err(TileError::Cancelled { key }) => {
            debug!(tile = %key, "Tile abandoned on cancellation");
            ItemOutcome::Failed
        }
        Err(e) => {
            warn!(tile = %e.key(), error = %e, "Tile failed");
            ItemOutcome::Failed
        }
    };

    // Reporter outlives every task; a send error only means it already stopped
    let _ = progress.send(ProgressEvent {
        outcome,
        elapsed: started.elapsed(),
    });
}

/// Encode, digest and write one item.
///
/// When the codec fails, the original bytes are stored under their own
/// digest so the item's reference still resolves; the item is still
/// reported as failed.
async fn transcode_tile(
    tile: SourceTile,
    encoder: Arc<dyn TileEncoder>,
    writer: Arc<DedupWriter>,
    cancel: &CancellationToken,
) -> Result<WriteOutcome, TileError> {
    let SourceTile { key, data } = tile;
    let data: Arc<[u8]> = Arc::from(data);

    match encode_stage(&key, Arc::clone(&data), encoder, cancel).await {
        Ok(encoded) => {
            let digest = TileDigest::compute(&encoded);
            write_stage(&key, digest, encoded, writer).await
        }
        Err(e @ (TileError::Encode { .. } | TileError::Panicked { .. })) => {
            debug!(tile = %key, "Storing original image after encode failure");
            let digest = TileDigest::compute(&data);
            write_stage(&key, digest, data.to_vec(), writer).await?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Count a task that ended by panicking as a failed item.
fn record_join(joined: Result<(), JoinError>, progress: &ProgressSender) {
    if let Err(e) = joined {
        error!(error = %e, "Transcode task panicked");
        let _ = progress.send(ProgressEvent {
            outcome: ItemOutcome::Failed,
            elapsed: Duration::ZERO,
        });
    }
}

/// Drop the helper, check integrity, optimise and close.
///
/// Nothing here fails the run; problems become warnings in the summary.
async fn finalize(
    dest: Arc<DestinationArchive>,
    writer: Arc<DedupWriter>,
    images_inserted: u64,
) -> Finalized {
    let task = spawn_blocking(move || {
        let mut warnings = Vec::new();

        if let Err(e) = writer.drop_helper() {
            warnings.push(format!("drop helper: {}", e));
        }
        drop(writer);

        let counts = dest.with_connection(|conn| {
            Ok((
                maintenance::count_images(conn)?,
                maintenance::count_dangling_references(conn)?,
            ))
        });
        let (distinct_images, dangling_references) = match counts {
            Ok(counts) => counts,
            Err(e) => {
                warnings.push(format!("integrity check: {}", e));
                (images_inserted, 0)
            }
        };

        match dest.with_connection(|conn| Ok(maintenance::optimize(conn))) {
            Ok(step_warnings) => warnings.extend(step_warnings),
            Err(e) => warnings.push(format!("optimize: {}", e)),
        }

        match Arc::try_unwrap(dest) {
            Ok(dest) => {
                if let Err(e) = dest.close() {
                    warnings.push(format!("close: {}", e));
                }
            }
            Err(_) => debug!("Destination still shared; closing on last drop"),
        }

        Finalized {
            distinct_images,
            dangling_references,
            warnings,
        }
    });

    let finalized = match task.await {
        Ok(finalized) => finalized,
        Err(e) => Finalized {
            distinct_images: images_inserted,
            dangling_references: 0,
            warnings: vec![format!("finalize task failed: {}", e)],
        },
    };

    if finalized.dangling_references > 0 {
        warn!(
            dangling = finalized.dangling_references,
            "References without a stored image"
        );
    }
    for warning in &finalized.warnings {
        warn!(warning = %warning, "Finalisation step did not complete");
    }

    finalized
}
