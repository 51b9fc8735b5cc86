//! Transcode configuration.

use super::defaults::{
    default_concurrency, DEFAULT_ALPHA_QUALITY, DEFAULT_METHOD, DEFAULT_QUALITY, MAX_CONCURRENCY,
    MAX_METHOD, MAX_QUALITY, MIN_CONCURRENCY,
};
use super::ConfigError;

/// Encoder settings and concurrency bound for one run.
///
/// Immutable for the duration of a run. Values are only range-checked by
/// [`validate`](Self::validate), so out-of-range input can be represented
/// and reported rather than silently clamped.
///
/// # Example
///
/// ```
/// use tilesqueeze::config::TranscodeConfig;
///
/// let config = TranscodeConfig::default()
///     .with_quality(80)
///     .with_concurrency(4);
/// assert!(config.validate().is_ok());
///
/// assert!(TranscodeConfig::default().with_quality(150).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeConfig {
    /// Lossy quality (0-100)
    quality: u32,
    /// Alpha plane quality (0-100)
    alpha_quality: u32,
    /// Effort / compression method (0-6)
    method: u32,
    /// Maximum concurrent transcodes (1-100)
    concurrency: usize,
}

impl TranscodeConfig {
    /// Set the lossy quality.
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Set the alpha plane quality.
    pub fn with_alpha_quality(mut self, alpha_quality: u32) -> Self {
        self.alpha_quality = alpha_quality;
        self
    }

    /// Set the compression method.
    pub fn with_method(mut self, method: u32) -> Self {
        self.method = method;
        self
    }

    /// Set the concurrency bound.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    pub fn alpha_quality(&self) -> u32 {
        self.alpha_quality
    }

    pub fn method(&self) -> u32 {
        self.method
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check every setting against its allowed range.
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("quality", self.quality as u64, 0, MAX_QUALITY as u64)?;
        check_range(
            "alpha_quality",
            self.alpha_quality as u64,
            0,
            MAX_QUALITY as u64,
        )?;
        check_range("method", self.method as u64, 0, MAX_METHOD as u64)?;
        check_range(
            "concurrency",
            self.concurrency as u64,
            MIN_CONCURRENCY as u64,
            MAX_CONCURRENCY as u64,
        )
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            alpha_quality: DEFAULT_ALPHA_QUALITY,
            method: DEFAULT_METHOD,
            concurrency: default_concurrency(),
        }
    }
}
