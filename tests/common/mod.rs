//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fixture application tree shipped with the tests.
pub fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/app")
}

/// Copies the fixture application into a fresh temporary project directory.
pub fn fixture_project() -> tempfile::TempDir {
    let project = tempfile::tempdir().unwrap();
    let source = fixture_dir();
    for entry in WalkDir::new(&source) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(&source).unwrap();
        let target = project.path().join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
    project
}

/// Writes `kodegen-package.toml` into the project.
pub fn write_config(project: &Path, toml: &str) {
    std::fs::write(project.join("kodegen-package.toml"), toml).unwrap();
}

/// Entry names of a tar archive.
pub fn tar_entries(archive: &Path) -> Vec<String> {
    let file = std::fs::File::open(archive).unwrap();
    let mut archive = tar::Archive::new(file);
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

/// Entry names of a gzip compressed tar archive.
pub fn tar_gz_entries(archive: &Path) -> Vec<String> {
    let file = std::fs::File::open(archive).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}
