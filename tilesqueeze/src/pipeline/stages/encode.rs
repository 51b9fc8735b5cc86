//! Encode stage - re-encodes one stored image.

use crate::archive::TileKey;
use crate::codec::TileEncoder;
use crate::pipeline::TileError;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Re-encodes a source image on the blocking pool.
///
/// The input is shared rather than moved so the caller keeps the original
/// bytes for the fallback write when encoding fails.
///
/// If `cancel` fires first, the blocking call is abandoned (it finishes in
/// the background and its output is discarded).
#[instrument(skip_all, fields(tile = %key))]
pub async fn encode_stage(
    key: &TileKey,
    data: Arc<[u8]>,
    encoder: Arc<dyn TileEncoder>,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, TileError> {
    let input_size = data.len();
    let task = spawn_blocking(move || encoder.encode(&data));

    let joined = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(TileError::Cancelled { key: key.clone() });
        }
        joined = task => joined,
    };

    let encoded = joined
        .map_err(|e| TileError::Panicked {
            key: key.clone(),
            stage: "encode",
            message: e.to_string(),
        })?
        .map_err(|source| TileError::Encode {
            key: key.clone(),
            source,
        })?;

    debug!(
        input_size,
        output_size = encoded.len(),
        "Encode stage complete"
    );

    Ok(encoded)
}
