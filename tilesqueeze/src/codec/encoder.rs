//! TileEncoder trait for abstracting image re-encoding.
//!
//! The pipeline treats the codec as an opaque function: bytes in, bytes out,
//! or a failure. Anything implementing [`TileEncoder`] can be plugged into a
//! run, which is how tests inject deterministic failures and observe
//! concurrency without a real image codec.
//!
//! # Example
//!
//! ```
//! use tilesqueeze::codec::{TileEncoder, WebpTileEncoder};
//! use tilesqueeze::config::TranscodeConfig;
//! use std::sync::Arc;
//!
//! let encoder: Arc<dyn TileEncoder> =
//!     Arc::new(WebpTileEncoder::new(&TranscodeConfig::default()));
//!
//! assert_eq!(encoder.format(), "webp");
//! ```

use crate::codec::CodecError;
use std::sync::Arc;

/// Trait for tile re-encoding strategies.
///
/// Implementations must be thread-safe (`Send + Sync`); the pipeline calls
/// `encode` from many blocking worker threads at once. `encode` must not
/// retain or mutate its input, and a failure for one image must not affect
/// any other call.
pub trait TileEncoder: Send + Sync {
    /// Re-encode one source image.
    ///
    /// # Arguments
    ///
    /// * `data` - The stored image bytes exactly as read from the archive
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the input cannot be decoded or the target
    /// format cannot be produced.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Value written to the archive's `format` metadata key.
    fn format(&self) -> &str;

    /// Human-readable encoder name for logs.
    fn name(&self) -> &str;
}

/// Blanket implementation for Arc-wrapped encoders.
impl<T: TileEncoder + ?Sized> TileEncoder for Arc<T> {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        (**self).encode(data)
    }

    fn format(&self) -> &str {
        (**self).format()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
