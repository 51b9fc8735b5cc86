//! Tile archive access.
//!
//! Everything that touches SQLite lives here:
//!
//! - [`open_source`] / [`DestinationArchive`] - connections
//! - [`TileLayout`] - which tables hold the tile images
//! - [`SchemaReplicator`] - catalog and non-image data copy
//! - [`TileSource`] - streaming reader over source images
//! - [`DedupWriter`] - content-addressed image store and reference rewrite
//! - [`maintenance`] - integrity check and storage optimisation

mod connection;
mod error;
mod ident;
mod layout;
pub mod maintenance;
mod schema;
mod source;
mod tile;
mod writer;

pub use connection::{open_source, DestinationArchive};
pub use error::ArchiveError;
pub use ident::{is_valid_identifier, quote_identifier};
pub use layout::{table_columns, table_names, TileLayout, IMAGES_TABLE, MAP_TABLE, TILES_TABLE};
pub use schema::{
    copy_table, read_catalog, update_format_metadata, ObjectKind, ReplicationReport,
    SchemaObject, SchemaReplicator,
};
pub use source::{count_tiles, TileSource};
pub use tile::{SourceTile, TileCoord, TileKey};
pub use writer::{DedupWriter, WriteOutcome};
