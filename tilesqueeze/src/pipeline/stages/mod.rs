//! Per-tile pipeline stages.
//!
//! Each admitted tile runs through:
//!
//! 1. **Encode** - re-encode the stored image (blocking pool)
//! 2. **Digest** - hash the output bytes
//! 3. **Write** - insert-if-absent plus reference update, one transaction

mod encode;
mod write;

pub use encode::encode_stage;
pub use write::write_stage;
