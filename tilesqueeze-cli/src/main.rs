//! tilesqueeze CLI - Command-line interface
//!
//! Re-encodes every image of a tile archive to lossy WebP and writes a
//! content-deduplicated copy of the archive.

mod error;
mod runner;

use clap::Parser;
use runner::{print_summary, CliRunner, Overrides};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tilesqueeze")]
#[command(version = tilesqueeze::VERSION)]
#[command(about = "Transcode a tile archive to WebP and deduplicate its images", long_about = None)]
struct Args {
    /// Source tile archive (opened read-only)
    input: PathBuf,

    /// Destination tile archive
    output: PathBuf,

    /// Lossy quality (0-100)
    #[arg(short, long)]
    quality: Option<u32>,

    /// Alpha plane quality (0-100)
    #[arg(long)]
    alpha_quality: Option<u32>,

    /// Compression effort (0 = fastest, 6 = smallest)
    #[arg(short, long)]
    method: Option<u32>,

    /// Maximum concurrent transcodes (1-100, default: number of CPUs)
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Replace the destination if it exists
    #[arg(long)]
    overwrite: bool,

    /// Skip the upfront tile count (no total or ETA in progress output)
    #[arg(long)]
    skip_count: bool,

    /// Completions between progress reports
    #[arg(long)]
    report_interval: Option<u64>,

    /// INI configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            quality: self.quality,
            alpha_quality: self.alpha_quality,
            method: self.method,
            concurrency: self.concurrency,
            report_interval: self.report_interval,
            skip_count: self.skip_count,
            overwrite: self.overwrite,
            log_file: self.log_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let runner = match CliRunner::new(args.config.as_deref(), &args.overrides(), args.verbose) {
        Ok(runner) => runner,
        Err(e) => e.exit(),
    };

    match runner.run(&args.input, &args.output).await {
        Ok(summary) => print_summary(&summary),
        Err(e) => e.exit(),
    }
}
