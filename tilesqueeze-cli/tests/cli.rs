//! End-to-end tests for the `tilesqueeze` binary.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn tilesqueeze(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tilesqueeze"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run tilesqueeze binary")
}

/// Flat archive whose tiles are not decodable images.
fn undecodable_archive(dir: &Path) -> PathBuf {
    let path = dir.join("in.mbtiles");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE metadata (name TEXT, value TEXT);
         INSERT INTO metadata VALUES ('format', 'png');
         CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
         INSERT INTO tiles VALUES (0, 0, 0, x'00010203');
         INSERT INTO tiles VALUES (1, 0, 0, x'00010203');",
    )
    .unwrap();
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_out_of_range_quality_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let input = undecodable_archive(dir.path());
    let output = dir.path().join("out.mbtiles");

    let result = tilesqueeze(&[path_str(&input), path_str(&output), "--quality", "150"]);

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("quality"));
    assert!(!output.exists());
}

#[test]
fn test_missing_input_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.mbtiles");
    let output = dir.path().join("out.mbtiles");

    let result = tilesqueeze(&[path_str(&input), path_str(&output)]);

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("not found"));
}

#[test]
fn test_existing_output_requires_overwrite() {
    let dir = TempDir::new().unwrap();
    let input = undecodable_archive(dir.path());
    let output = dir.path().join("out.mbtiles");
    std::fs::write(&output, b"keep me").unwrap();

    let result = tilesqueeze(&[path_str(&input), path_str(&output)]);

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("--overwrite"));
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
}

#[test]
fn test_per_tile_failures_do_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let input = undecodable_archive(dir.path());
    let output = dir.path().join("out.mbtiles");

    let result = tilesqueeze(&[path_str(&input), path_str(&output), "-j", "2"]);

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Tiles processed:   2"));
    assert!(stdout.contains("Tiles failed:      2"));
    assert!(stdout.contains("Distinct images:   1"));

    // Undecodable originals are kept so every reference resolves
    let conn = Connection::open(&output).unwrap();
    let resolvable: i64 = conn
        .query_row("SELECT count(*) FROM tiles", [], |row| row.get(0))
        .unwrap();
    assert_eq!(resolvable, 2);
}
