#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vscov::tree::CoverageTree;

/// Path to a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Read a fixture into a tree.
pub fn read_fixture(name: &str) -> CoverageTree {
    vscov::reader::read_coverage_file(&fixture(name)).unwrap()
}

/// Copy a fixture into a fresh temporary directory. The caller must hold on
/// to `TempDir` to keep the directory alive.
pub fn fixture_in_tempdir(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::copy(fixture(name), &path).unwrap();
    (dir, path)
}
