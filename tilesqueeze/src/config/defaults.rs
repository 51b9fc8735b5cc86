//! Default values and limits for all configuration settings.

/// Default lossy quality (0-100).
pub const DEFAULT_QUALITY: u32 = 75;

/// Default alpha plane quality (0-100).
pub const DEFAULT_ALPHA_QUALITY: u32 = 100;

/// Default compression method (0 = fastest, 6 = smallest).
pub const DEFAULT_METHOD: u32 = 4;

/// Upper bound for quality and alpha quality.
pub const MAX_QUALITY: u32 = 100;

/// Upper bound for the compression method.
pub const MAX_METHOD: u32 = 6;

/// Lower bound for concurrent transcodes.
pub const MIN_CONCURRENCY: usize = 1;

/// Upper bound for concurrent transcodes.
pub const MAX_CONCURRENCY: usize = 100;

/// Completions between progress reports.
pub const DEFAULT_REPORT_INTERVAL: u64 = 100;

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Default concurrency: one transcode per core, capped at [`MAX_CONCURRENCY`].
pub fn default_concurrency() -> usize {
    num_cpus().clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}
