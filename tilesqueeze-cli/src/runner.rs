//! CLI runner for setup and the transcode run.
//!
//! Encapsulates config file loading, flag merging, logging initialization
//! and shutdown signal wiring.

use crate::error::CliError;
use std::path::{Path, PathBuf};
use tilesqueeze::config::{ConfigFile, RunOptions, TranscodeConfig};
use tilesqueeze::logging::{init_logging, LoggingGuard};
use tilesqueeze::pipeline::{progress::format_duration, RunSummary, TranscodeRun};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Settings given on the command line. `None` means "use the config file".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub quality: Option<u32>,
    pub alpha_quality: Option<u32>,
    pub method: Option<u32>,
    pub concurrency: Option<usize>,
    pub report_interval: Option<u64>,
    pub skip_count: bool,
    pub overwrite: bool,
    pub log_file: Option<PathBuf>,
}

/// Layer command-line overrides over the config file.
pub fn merge_settings(file: &ConfigFile, overrides: &Overrides) -> (TranscodeConfig, RunOptions) {
    let mut config = file.transcode;
    if let Some(quality) = overrides.quality {
        config = config.with_quality(quality);
    }
    if let Some(alpha_quality) = overrides.alpha_quality {
        config = config.with_alpha_quality(alpha_quality);
    }
    if let Some(method) = overrides.method {
        config = config.with_method(method);
    }
    if let Some(concurrency) = overrides.concurrency {
        config = config.with_concurrency(concurrency);
    }

    let options = RunOptions::default()
        .with_report_interval(
            overrides
                .report_interval
                .unwrap_or(file.progress.report_interval),
        )
        .with_skip_upfront_count(overrides.skip_count || file.progress.skip_count)
        .with_overwrite(overrides.overwrite);

    (config, options)
}

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Logging guard - keeps the file writer alive while the runner exists
    _logging_guard: LoggingGuard,
    config: TranscodeConfig,
    options: RunOptions,
}

impl CliRunner {
    /// Load config, merge flags and initialize logging.
    pub fn new(
        config_path: Option<&Path>,
        overrides: &Overrides,
        verbose: bool,
    ) -> Result<Self, CliError> {
        let file = ConfigFile::load_or_default(config_path)?;
        let (config, options) = merge_settings(&file, overrides);

        let log_file = overrides.log_file.as_deref().or(file.logging.file.as_deref());
        let logging_guard =
            init_logging(log_file, verbose).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        info!("tilesqueeze v{}", tilesqueeze::VERSION);
        if let Some(path) = config_path {
            info!(path = %path.display(), "Loaded config file");
        }

        Ok(Self {
            _logging_guard: logging_guard,
            config,
            options,
        })
    }

    /// Run the transcode, cancelling on Ctrl-C.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<RunSummary, CliError> {
        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after in-flight tiles");
                signal_cancel.cancel();
            }
        });

        let options = self.options.clone().with_cancellation(cancel);
        let result = TranscodeRun::new(input, output, self.config)
            .with_options(options)
            .run()
            .await;

        signal_task.abort();
        Ok(result?)
    }
}

/// Print the end-of-run summary to stdout.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("Transcode complete ({} layout)", summary.layout.name());
    println!("  Tiles processed:   {}", summary.processed);
    println!("  Tiles failed:      {}", summary.failed);
    println!("  Distinct images:   {}", summary.distinct_images);
    println!("  Elapsed:           {}", format_duration(summary.elapsed));

    if summary.dangling_references > 0 {
        println!(
            "  Warning: {} reference(s) point at no stored image",
            summary.dangling_references
        );
    }
    for warning in &summary.finalize_warnings {
        println!("  Warning: {}", warning);
    }
    if summary.failed > 0 {
        eprintln!(
            "Warning: {} tile(s) failed to transcode; see log for details",
            summary.failed
        );
    }
}
