//! Identifier allow-list for catalog object names.
//!
//! Table, index and view names come from the source catalog, never from user
//! input, but they are still checked before being spliced into a statement.

use crate::archive::ArchiveError;
use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Returns true if `name` may be used as an identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Validates `name` and returns it double-quoted.
pub fn quote_identifier(name: &str) -> Result<String, ArchiveError> {
    if is_valid_identifier(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(ArchiveError::InvalidIdentifier(name.to_string()))
    }
}
