//! SHA-256 digests of archives and artifacts.
//!
//! Files are hashed in chunks; directory trees (unpacked application
//! directories) hash every file's relative path and content in sorted order.

use crate::{
    bail,
    bundler::{Error, ErrorExt, Result},
};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Calculates the SHA-256 checksum of a file or directory.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash (64 characters)
/// * `Err` - If path cannot be read or is neither file nor directory
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading metadata for hashing", path)?;

    if metadata.is_file() {
        let mut hasher = Sha256::new();
        hash_file(path, &mut hasher).await?;
        Ok(format!("{:x}", hasher.finalize()))
    } else if metadata.is_dir() {
        calculate_directory_sha256(path).await
    } else {
        bail!("Path is neither file nor directory: {}", path.display())
    }
}

async fn hash_file(file_path: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut file = tokio::fs::File::open(file_path)
        .await
        .fs_context("opening file for hashing", file_path)?;
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", file_path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(())
}

async fn calculate_directory_sha256(dir_path: &Path) -> Result<String> {
    let root = dir_path.to_path_buf();
    let mut entries = tokio::task::spawn_blocking(move || {
        walkdir::WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter(|e| e.as_ref().map_or(true, |e| e.file_type().is_file()))
            .map(|e| e.map(walkdir::DirEntry::into_path))
            .collect::<std::result::Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| Error::GenericError(format!("Hashing task panicked: {e}")))??;

    // Sort by path for deterministic ordering
    entries.sort();

    let mut hasher = Sha256::new();
    for entry in entries {
        let rel_path = entry.strip_prefix(dir_path)?;
        hasher.update(rel_path.to_string_lossy().as_bytes());
        hash_file(&entry, &mut hasher).await?;
    }

    Ok(format!("{:x}", hasher.finalize()))
}
