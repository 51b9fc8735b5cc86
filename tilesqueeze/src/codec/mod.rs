//! Tile image codecs.
//!
//! - [`TileEncoder`] - the seam the pipeline encodes through
//! - [`WebpTileEncoder`] - lossy WebP output with quality, alpha quality and
//!   method settings
//! - [`CodecError`] - why a single image could not be re-encoded

mod encoder;
mod error;
mod webp_encoder;

pub use self::encoder::TileEncoder;
pub use self::error::CodecError;
pub use self::webp_encoder::WebpTileEncoder;
