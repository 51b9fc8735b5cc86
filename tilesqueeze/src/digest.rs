//! Content addressing for stored tile images.
//!
//! Every image written to the destination archive is keyed by the SHA-256
//! digest of its own bytes. Byte-identical images therefore collapse onto a
//! single row in the image table, and the digest doubles as the join key
//! between the `map` and `images` tables.

use rusqlite::types::{ToSql, ToSqlOutput};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a digest rendered as lowercase hex.
pub const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 digest of a tile image.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileDigest([u8; 32]);

impl TileDigest {
    /// Computes the digest of `data`.
    ///
    /// Never fails; the empty buffer has a well-defined digest like any other.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Encodes the digest as lowercase hex, the form stored in the archive.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for TileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl ToSql for TileDigest {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_hex()))
    }
}
