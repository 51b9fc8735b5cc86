//! Lossy WebP re-encoding.

use crate::codec::{CodecError, TileEncoder};
use crate::config::TranscodeConfig;
use image::DynamicImage;

/// Re-encodes any `image`-decodable tile (PNG, JPEG, WebP, ...) as lossy WebP.
///
/// Images with an alpha channel keep it; `alpha_quality` controls how hard
/// the alpha plane is compressed. `method` trades encode time for size
/// (0 = fastest, 6 = smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpTileEncoder {
    quality: u32,
    alpha_quality: u32,
    method: u32,
}

impl WebpTileEncoder {
    /// Creates an encoder from the run configuration.
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            quality: config.quality(),
            alpha_quality: config.alpha_quality(),
            method: config.method(),
        }
    }

    fn webp_config(&self) -> Result<webp::WebPConfig, CodecError> {
        let mut config = webp::WebPConfig::new()
            .map_err(|_| CodecError::InvalidConfig("libwebp rejected defaults".to_string()))?;
        config.lossless = 0;
        config.quality = self.quality as f32;
        config.alpha_quality = self.alpha_quality as i32;
        config.method = self.method as i32;
        Ok(config)
    }
}

impl TileEncoder for WebpTileEncoder {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let decoded =
            image::load_from_memory(data).map_err(|e| CodecError::DecodeFailed(e.to_string()))?;

        // libwebp only takes 8-bit RGB or RGBA
        let image = if decoded.color().has_alpha() {
            DynamicImage::ImageRgba8(decoded.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(decoded.to_rgb8())
        };

        let encoder = webp::Encoder::from_image(&image)
            .map_err(|e| CodecError::Unsupported(e.to_string()))?;
        let config = self.webp_config()?;

        let encoded = encoder
            .encode_advanced(&config)
            .map_err(|e| CodecError::EncodingFailed(format!("{:?}", e)))?;

        Ok(encoded.to_vec())
    }

    fn format(&self) -> &str {
        "webp"
    }

    fn name(&self) -> &str {
        "WebP (lossy)"
    }
}
