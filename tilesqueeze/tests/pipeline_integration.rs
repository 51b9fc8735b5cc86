//! Integration tests for the transcode pipeline.
//!
//! These tests build small archives on disk and verify complete runs:
//! - Deduplication of byte-identical output
//! - Both source layouts
//! - Per-tile failure isolation and referential integrity
//! - The concurrency bound
//! - Configuration rejection before any archive I/O

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use rusqlite::Connection;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tilesqueeze::archive::TileLayout;
use tilesqueeze::codec::{CodecError, TileEncoder, WebpTileEncoder};
use tilesqueeze::config::{RunOptions, TranscodeConfig};
use tilesqueeze::digest::TileDigest;
use tilesqueeze::pipeline::{PipelineError, RunPhase, TranscodeRun};

// =============================================================================
// Test Helpers
// =============================================================================

/// Passes input through unchanged; fails on inputs starting with `fail`.
struct PassthroughEncoder;

impl TileEncoder for PassthroughEncoder {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.starts_with(b"fail") {
            return Err(CodecError::DecodeFailed("injected failure".to_string()));
        }
        Ok(data.to_vec())
    }

    fn format(&self) -> &str {
        "raw"
    }

    fn name(&self) -> &str {
        "Passthrough"
    }
}

/// Always produces the same bytes.
struct ConstantEncoder;

impl TileEncoder for ConstantEncoder {
    fn encode(&self, _data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(b"constant".to_vec())
    }

    fn format(&self) -> &str {
        "raw"
    }

    fn name(&self) -> &str {
        "Constant"
    }
}

/// Sleeps per call and records the highest number of concurrent calls.
struct SlowEncoder {
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowEncoder {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl TileEncoder for SlowEncoder {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(data.to_vec())
    }

    fn format(&self) -> &str {
        "raw"
    }

    fn name(&self) -> &str {
        "Slow"
    }
}

fn png(color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(32, 32, Rgba(color));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Deduplicated-layout archive: `refs` are (zoom, column, row, image id),
/// `images` are (image id, bytes).
fn deduplicated_archive(
    dir: &Path,
    name: &str,
    refs: &[(i64, i64, i64, &str)],
    images: &[(&str, Vec<u8>)],
) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE metadata (name TEXT, value TEXT);
         CREATE UNIQUE INDEX name ON metadata (name);
         CREATE TABLE map (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_id TEXT, grid_id TEXT);
         CREATE UNIQUE INDEX map_index ON map (zoom_level, tile_column, tile_row);
         CREATE TABLE images (tile_data BLOB, tile_id TEXT);
         CREATE UNIQUE INDEX images_id ON images (tile_id);
         CREATE VIEW tiles AS
             SELECT map.zoom_level AS zoom_level, map.tile_column AS tile_column,
                    map.tile_row AS tile_row, images.tile_data AS tile_data
             FROM map JOIN images ON images.tile_id = map.tile_id;
         INSERT INTO metadata VALUES ('name', 'fixture'), ('format', 'png');",
    )
    .unwrap();
    for (zoom, column, row, id) in refs {
        conn.execute(
            "INSERT INTO map VALUES (?1, ?2, ?3, ?4, NULL)",
            rusqlite::params![zoom, column, row, id],
        )
        .unwrap();
    }
    for (id, data) in images {
        conn.execute(
            "INSERT INTO images VALUES (?1, ?2)",
            rusqlite::params![data, id],
        )
        .unwrap();
    }
    path
}

fn flat_archive(dir: &Path, tiles: &[Vec<u8>]) -> PathBuf {
    let path = dir.join("flat.mbtiles");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE metadata (name TEXT, value TEXT);
         INSERT INTO metadata VALUES ('format', 'jpg');
         CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
         CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);",
    )
    .unwrap();
    for (i, data) in tiles.iter().enumerate() {
        conn.execute(
            "INSERT INTO tiles VALUES (4, ?1, ?2, ?3)",
            rusqlite::params![(i % 4) as i64, (i / 4) as i64, data],
        )
        .unwrap();
    }
    path
}

/// Flat archive without a coordinate index, holding exactly `rows`.
fn loose_flat_archive(dir: &Path, rows: &str) -> PathBuf {
    let path = dir.join("loose.mbtiles");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);",
    )
    .unwrap();
    conn.execute_batch(&format!("INSERT INTO tiles VALUES {};", rows))
        .unwrap();
    path
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn dangling(conn: &Connection) -> i64 {
    count(
        conn,
        "SELECT count(*) FROM map WHERE tile_id NOT IN (SELECT tile_id FROM images)",
    )
}

fn run_with(
    source: &Path,
    dest: &Path,
    config: TranscodeConfig,
    encoder: Arc<dyn TileEncoder>,
) -> TranscodeRun {
    TranscodeRun::new(source, dest, config).with_encoder(encoder)
}

// =============================================================================
// Deduplication
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_three_references_two_images_webp() {
    let dir = TempDir::new().unwrap();
    let source = deduplicated_archive(
        dir.path(),
        "in.mbtiles",
        &[(1, 0, 0, "red"), (1, 1, 0, "red"), (1, 0, 1, "blue")],
        &[("red", png([255, 0, 0, 255])), ("blue", png([0, 0, 255, 255]))],
    );
    let dest = dir.path().join("out.mbtiles");
    let config = TranscodeConfig::default().with_concurrency(2);

    let summary = TranscodeRun::new(&source, &dest, config).run().await.unwrap();

    assert_eq!(summary.layout, TileLayout::Deduplicated);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.distinct_images, 2);
    assert_eq!(summary.dangling_references, 0);

    let conn = Connection::open(&dest).unwrap();
    assert_eq!(count(&conn, "SELECT count(*) FROM map"), 3);
    assert_eq!(count(&conn, "SELECT count(DISTINCT tile_id) FROM images"), 2);
    assert_eq!(count(&conn, "SELECT count(*) FROM tiles"), 3);
    assert_eq!(dangling(&conn), 0);

    // Every stored image is WebP and keyed by the digest of its bytes
    let mut stmt = conn.prepare("SELECT tile_id, tile_data FROM images").unwrap();
    let rows: Vec<(String, Vec<u8>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for (id, data) in rows {
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WEBP");
        assert_eq!(id, TileDigest::compute(&data).to_hex());
    }

    let format: String = conn
        .query_row("SELECT value FROM metadata WHERE name = 'format'", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(format, "webp");
}

#[tokio::test]
async fn test_identical_output_stored_once() {
    let dir = TempDir::new().unwrap();
    let source = deduplicated_archive(
        dir.path(),
        "in.mbtiles",
        &[(0, 0, 0, "a"), (1, 0, 0, "b"), (1, 1, 0, "c")],
        &[("a", b"one".to_vec()), ("b", b"two".to_vec()), ("c", b"three".to_vec())],
    );
    let dest = dir.path().join("out.mbtiles");

    let summary = run_with(
        &source,
        &dest,
        TranscodeConfig::default().with_concurrency(3),
        Arc::new(ConstantEncoder),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.distinct_images, 1);

    let conn = Connection::open(&dest).unwrap();
    let expected = TileDigest::compute(b"constant").to_hex();
    let ids: i64 = conn
        .query_row(
            "SELECT count(*) FROM map WHERE tile_id = ?1",
            [&expected],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(ids, 3);
}

#[tokio::test]
async fn test_rerun_on_own_output() {
    let dir = TempDir::new().unwrap();
    let source = deduplicated_archive(
        dir.path(),
        "in.mbtiles",
        &[(0, 0, 0, "a"), (1, 0, 0, "b"), (1, 1, 0, "a")],
        &[("a", b"alpha".to_vec()), ("b", b"beta".to_vec())],
    );
    let first = dir.path().join("first.mbtiles");
    let second = dir.path().join("second.mbtiles");
    let config = TranscodeConfig::default().with_concurrency(2);

    run_with(&source, &first, config, Arc::new(PassthroughEncoder))
        .run()
        .await
        .unwrap();
    let summary = run_with(&first, &second, config, Arc::new(PassthroughEncoder))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.distinct_images, 2);

    let a = Connection::open(&first).unwrap();
    let b = Connection::open(&second).unwrap();
    let refs = |conn: &Connection| -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT tile_id FROM map ORDER BY zoom_level, tile_column, tile_row")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    };
    assert_eq!(refs(&a), refs(&b));
}

// =============================================================================
// Layouts and replication
// =============================================================================

#[tokio::test]
async fn test_flat_layout_becomes_deduplicated() {
    let dir = TempDir::new().unwrap();
    let tiles: Vec<Vec<u8>> = (0..8).map(|i| vec![b'x', (i % 3) as u8]).collect();
    let source = flat_archive(dir.path(), &tiles);
    let dest = dir.path().join("out.mbtiles");

    let summary = run_with(
        &source,
        &dest,
        TranscodeConfig::default().with_concurrency(4),
        Arc::new(PassthroughEncoder),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.layout, TileLayout::Flat);
    assert_eq!(summary.total, Some(8));
    assert_eq!(summary.processed, 8);
    assert_eq!(summary.distinct_images, 3);

    let conn = Connection::open(&dest).unwrap();
    assert_eq!(count(&conn, "SELECT count(*) FROM map"), 8);
    assert_eq!(count(&conn, "SELECT count(*) FROM images"), 3);
    assert_eq!(dangling(&conn), 0);

    // Clients reading the tiles view see the original coordinates and bytes
    let data: Vec<u8> = conn
        .query_row(
            "SELECT tile_data FROM tiles WHERE zoom_level = 4 AND tile_column = 1 AND tile_row = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(data, tiles[5]);
}

#[tokio::test]
async fn test_repeated_flat_coordinate_rejected_before_destination() {
    let dir = TempDir::new().unwrap();
    let source = loose_flat_archive(
        dir.path(),
        "(0, 0, 0, x'01'), (0, 0, 0, x'02'), (1, 0, 0, x'03')",
    );
    let dest = dir.path().join("out.mbtiles");

    let result = run_with(
        &source,
        &dest,
        TranscodeConfig::default().with_concurrency(1),
        Arc::new(PassthroughEncoder),
    )
    .run()
    .await;

    match result {
        Err(PipelineError::Structural { phase, .. }) => assert_eq!(phase, RunPhase::Initializing),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_every_readable_flat_row_gets_a_reference() {
    let dir = TempDir::new().unwrap();
    let source = loose_flat_archive(
        dir.path(),
        "(0, 0, 0, x'01'), (NULL, 0, 0, x'02'), (1, 0, 0, x'03'), (1, 1, 0, x'01')",
    );
    let dest = dir.path().join("out.mbtiles");

    let summary = run_with(
        &source,
        &dest,
        TranscodeConfig::default().with_concurrency(1),
        Arc::new(PassthroughEncoder),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.total, Some(4));
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.distinct_images, 2);
    assert_eq!(summary.dangling_references, 0);

    let conn = Connection::open(&dest).unwrap();
    assert_eq!(count(&conn, "SELECT count(*) FROM map"), 3);
    assert_eq!(dangling(&conn), 0);
}

#[tokio::test]
async fn test_other_tables_are_copied_verbatim() {
    let dir = TempDir::new().unwrap();
    let source = deduplicated_archive(
        dir.path(),
        "in.mbtiles",
        &[(0, 0, 0, "a")],
        &[("a", b"alpha".to_vec())],
    );
    {
        let conn = Connection::open(&source).unwrap();
        conn.execute_batch(
            "CREATE TABLE grids (grid_id TEXT, grid_utfgrid BLOB);
             CREATE INDEX grids_id ON grids (grid_id);
             CREATE VIEW grid_ids AS SELECT grid_id FROM grids;
             INSERT INTO grids VALUES ('g1', x'01'), ('g2', x'02'), ('g3', NULL);",
        )
        .unwrap();
    }
    let dest = dir.path().join("out.mbtiles");

    run_with(
        &source,
        &dest,
        TranscodeConfig::default(),
        Arc::new(PassthroughEncoder),
    )
    .with_options(RunOptions::default().with_skip_upfront_count(true))
    .run()
    .await
    .unwrap();

    let conn = Connection::open(&dest).unwrap();
    assert_eq!(count(&conn, "SELECT count(*) FROM grids"), 3);
    assert_eq!(count(&conn, "SELECT count(*) FROM grid_ids"), 3);
    assert_eq!(count(&conn, "SELECT count(*) FROM metadata"), 2);
    assert_eq!(
        count(
            &conn,
            "SELECT count(*) FROM sqlite_master WHERE type = 'index' AND name = 'grids_id'"
        ),
        1
    );
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_failure_is_isolated_to_its_tile() {
    let dir = TempDir::new().unwrap();
    let source = deduplicated_archive(
        dir.path(),
        "in.mbtiles",
        &[(0, 0, 0, "a"), (1, 0, 0, "b"), (1, 1, 0, "c"), (1, 1, 1, "b")],
        &[
            ("a", b"alpha".to_vec()),
            ("b", b"fail here".to_vec()),
            ("c", b"gamma".to_vec()),
        ],
    );
    let dest = dir.path().join("out.mbtiles");

    let summary = run_with(
        &source,
        &dest,
        TranscodeConfig::default().with_concurrency(2),
        Arc::new(PassthroughEncoder),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.dangling_references, 0);

    let conn = Connection::open(&dest).unwrap();
    assert_eq!(count(&conn, "SELECT count(*) FROM map"), 4);
    assert_eq!(dangling(&conn), 0);
    let kept: Vec<u8> = conn
        .query_row(
            "SELECT tile_data FROM tiles WHERE zoom_level = 1 AND tile_column = 1 AND tile_row = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(kept, b"fail here".to_vec());
}

#[tokio::test]
async fn test_out_of_range_quality_rejected_before_io() {
    let dir = TempDir::new().unwrap();
    let source = flat_archive(dir.path(), &[b"a".to_vec()]);
    let dest = dir.path().join("out").join("out.mbtiles");

    let result = TranscodeRun::new(&source, &dest, TranscodeConfig::default().with_quality(150))
        .run()
        .await;

    assert!(matches!(result, Err(PipelineError::Config(_))));
    assert!(!dest.exists());
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_destination_collision_and_overwrite() {
    let dir = TempDir::new().unwrap();
    let source = flat_archive(dir.path(), &[b"a".to_vec()]);
    let dest = dir.path().join("out.mbtiles");
    std::fs::write(&dest, b"stale").unwrap();

    let refused = run_with(
        &source,
        &dest,
        TranscodeConfig::default(),
        Arc::new(PassthroughEncoder),
    )
    .run()
    .await;
    assert!(matches!(refused, Err(PipelineError::Config(_))));
    assert_eq!(std::fs::read(&dest).unwrap(), b"stale");

    let summary = run_with(
        &source,
        &dest,
        TranscodeConfig::default(),
        Arc::new(PassthroughEncoder),
    )
    .with_options(RunOptions::default().with_overwrite(true))
    .run()
    .await
    .unwrap();
    assert_eq!(summary.processed, 1);
}

// =============================================================================
// Concurrency bound
// =============================================================================

async fn run_slow(concurrency: usize) -> (usize, usize, usize) {
    let dir = TempDir::new().unwrap();
    let tiles: Vec<Vec<u8>> = (0..8).map(|i| vec![i as u8]).collect();
    let source = flat_archive(dir.path(), &tiles);
    let dest = dir.path().join("out.mbtiles");
    let encoder = Arc::new(SlowEncoder::new(Duration::from_millis(40)));

    let summary = run_with(
        &source,
        &dest,
        TranscodeConfig::default().with_concurrency(concurrency),
        encoder.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.processed, 8);
    (
        encoder.max_active.load(Ordering::SeqCst),
        summary.peak_in_flight,
        encoder.calls.load(Ordering::SeqCst),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_one_serializes() {
    let (max_active, peak, calls) = run_slow(1).await;
    assert_eq!(max_active, 1);
    assert_eq!(peak, 1);
    assert_eq!(calls, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound_respected() {
    let (max_active, peak, calls) = run_slow(4).await;
    assert!(max_active > 1, "expected parallel encodes, saw {}", max_active);
    assert!(max_active <= 4, "bound exceeded: {}", max_active);
    assert!(peak <= 4);
    assert_eq!(calls, 8);
}
