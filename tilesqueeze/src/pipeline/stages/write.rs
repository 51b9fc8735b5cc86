//! Write stage - stores one image and updates its references.

use crate::archive::{DedupWriter, TileKey, WriteOutcome};
use crate::digest::TileDigest;
use crate::pipeline::TileError;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};

/// Stores `data` under its digest and points the item's references at it.
///
/// Runs the per-item transaction on the blocking pool. Not cancellable once
/// started; the transaction either commits or rolls back.
#[instrument(skip_all, fields(tile = %key, digest = ?digest))]
pub async fn write_stage(
    key: &TileKey,
    digest: TileDigest,
    data: Vec<u8>,
    writer: Arc<DedupWriter>,
) -> Result<WriteOutcome, TileError> {
    let task_key = key.clone();
    let outcome = spawn_blocking(move || writer.write(&task_key, &digest, &data))
        .await
        .map_err(|e| TileError::Panicked {
            key: key.clone(),
            stage: "write",
            message: e.to_string(),
        })?
        .map_err(|source| TileError::Write {
            key: key.clone(),
            source,
        })?;

    debug!(?outcome, "Write stage complete");
    Ok(outcome)
}
