//! Codec error types.

use thiserror::Error;

/// Errors raised while re-encoding a single tile image.
///
/// A codec error only ever concerns the one image being encoded; callers
/// attach the tile key when surfacing it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Source bytes could not be decoded as an image
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// Decoded image uses a pixel layout the encoder cannot take
    #[error("unsupported image: {0}")]
    Unsupported(String),

    /// Encoder could not be configured
    #[error("encoder configuration rejected: {0}")]
    InvalidConfig(String),

    /// Encoding itself failed
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}
