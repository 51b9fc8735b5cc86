//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::{MAX_CONCURRENCY, MAX_METHOD, MAX_QUALITY, MIN_CONCURRENCY};
use super::file::{ConfigFile, ConfigFileError};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [transcode] section
    if let Some(section) = ini.section(Some("transcode")) {
        if let Some(v) = section.get("quality") {
            let q = parse_in_range::<u32>("transcode", "quality", v, 0, MAX_QUALITY)?;
            config.transcode = config.transcode.with_quality(q);
        }
        if let Some(v) = section.get("alpha_quality") {
            let q = parse_in_range::<u32>("transcode", "alpha_quality", v, 0, MAX_QUALITY)?;
            config.transcode = config.transcode.with_alpha_quality(q);
        }
        if let Some(v) = section.get("method") {
            let m = parse_in_range::<u32>("transcode", "method", v, 0, MAX_METHOD)?;
            config.transcode = config.transcode.with_method(m);
        }
        if let Some(v) = section.get("concurrency") {
            let c = parse_in_range::<usize>(
                "transcode",
                "concurrency",
                v,
                MIN_CONCURRENCY,
                MAX_CONCURRENCY,
            )?;
            config.transcode = config.transcode.with_concurrency(c);
        }
    }

    // [progress] section
    if let Some(section) = ini.section(Some("progress")) {
        if let Some(v) = section.get("report_interval") {
            config.progress.report_interval =
                parse_in_range::<u64>("progress", "report_interval", v, 1, u64::MAX)?;
        }
        if let Some(v) = section.get("skip_count") {
            config.progress.skip_count = parse_bool("progress", "skip_count", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = Some(PathBuf::from(v));
            }
        }
    }

    Ok(config)
}

fn parse_in_range<T>(
    section: &str,
    key: &str,
    value: &str,
    min: T,
    max: T,
) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let invalid = |reason: String| ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| invalid("must be a non-negative integer".to_string()))?;
    if parsed < min || parsed > max {
        return Err(invalid(format!("must be between {} and {}", min, max)));
    }
    Ok(parsed)
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be true or false".to_string(),
        }),
    }
}
