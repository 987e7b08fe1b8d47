//! Single-file application archive.
//!
//! The pipeline only needs three things from an archive format: pack file
//! sets into it, compute its integrity and answer membership queries. The
//! [`Archiver`] trait is that seam; [`TarArchiver`] is the bundled
//! implementation writing an uncompressed tar next to an unpacked directory
//! for files that must stay on disk.

use super::{
    Error, ErrorExt, Result,
    builder::calculate_sha256,
    fileset::{FileKind, FileSet},
    matcher::{MatcherFilter, to_slash},
    transformer::Transformed,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Archive options resolved from configuration.
///
/// `None` in place of these options means the application is copied as
/// plain files.
#[derive(Clone, Default)]
pub struct ArchiveOptions {
    /// Keep native modules and executables out of the archive
    pub smart_unpack: bool,
    /// File listing preferred entry order, one relative path per line
    pub ordering: Option<PathBuf>,
    /// Allow files outside the archive in the integrity check
    pub external_allowed: bool,
    /// Files matching this filter stay on disk
    pub unpack: Option<Arc<MatcherFilter>>,
}

impl fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("smart_unpack", &self.smart_unpack)
            .field("ordering", &self.ordering)
            .field("external_allowed", &self.external_allowed)
            .field("unpack", &self.unpack.is_some())
            .finish()
    }
}

/// Integrity record handed to the framework before extra files are copied.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ArchiveIntegrity {
    /// Hash algorithm
    pub algorithm: String,
    /// Hex encoded digest of the archive
    pub hash: String,
    /// Archive size in bytes
    pub size: u64,
    /// Whether files outside the archive are allowed
    pub external_allowed: bool,
}

/// Archive format used in build mode.
#[async_trait]
pub trait Archiver: Send + Sync + fmt::Debug {
    /// File name of the archive inside the resources directory.
    fn archive_name(&self) -> &str;

    /// Packs `file_sets` into `<resources_dir>/<archive_name>` and returns its path.
    ///
    /// `app_root` is the destination the file sets were computed for; entry
    /// names are relative to it.
    async fn pack(
        &self,
        file_sets: &[FileSet],
        app_root: &Path,
        resources_dir: &Path,
        options: &ArchiveOptions,
    ) -> Result<PathBuf>;

    /// Computes the integrity of the archive in `resources_dir`.
    async fn integrity(&self, resources_dir: &Path, options: &ArchiveOptions) -> Result<ArchiveIntegrity>;

    /// Whether `relative` is packed in (or unpacked next to) `archive`.
    async fn contains(&self, archive: &Path, relative: &Path) -> Result<bool>;
}

/// Tar based [`Archiver`].
#[derive(Debug, Clone, Default)]
pub struct TarArchiver;

/// Name of the archive written by [`TarArchiver`].
pub const TAR_ARCHIVE_NAME: &str = "app.tar";

// Loaded by the runtime directly, so they cannot live inside the archive
const NATIVE_EXTENSIONS: &[&str] = &["node", "dll", "exe", "so", "dylib"];

struct PlannedEntry {
    name: String,
    source: PathBuf,
    kind: FileKind,
    transformed: Option<Transformed>,
    unpack: bool,
}

impl TarArchiver {
    /// Directory holding files kept out of `archive`.
    pub fn unpacked_dir(archive: &Path) -> PathBuf {
        let mut name = archive.as_os_str().to_owned();
        name.push(".unpacked");
        PathBuf::from(name)
    }

    fn plan(file_sets: &[FileSet], app_root: &Path, options: &ArchiveOptions) -> Result<Vec<PlannedEntry>> {
        let mut entries = Vec::new();
        for set in file_sets {
            for (index, file) in set.files.iter().enumerate() {
                let dest = set.destination.join(&file.relative);
                let name = match dest.strip_prefix(app_root) {
                    Ok(rel) => to_slash(rel),
                    Err(_) => to_slash(&file.relative),
                };
                let native = options.smart_unpack
                    && file
                        .path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| NATIVE_EXTENSIONS.contains(&e));
                let unpack = native || options.unpack.as_ref().is_some_and(|f| f.accepts(&file.path));
                entries.push(PlannedEntry {
                    name,
                    source: file.path.clone(),
                    kind: file.kind.clone(),
                    transformed: set.transformed.get(&index).cloned(),
                    unpack,
                });
            }
        }

        if let Some(ordering) = &options.ordering {
            let content = std::fs::read_to_string(ordering).fs_context("reading archive ordering", ordering)?;
            let rank: HashMap<&str, usize> = content
                .lines()
                .map(|l| l.trim().trim_start_matches("./"))
                .filter(|l| !l.is_empty())
                .enumerate()
                .map(|(i, l)| (l, i))
                .collect();
            // Stable: unlisted entries keep walk order after the listed ones
            entries.sort_by_key(|e| rank.get(e.name.as_str()).copied().unwrap_or(usize::MAX));
        }
        Ok(entries)
    }

    fn write(entries: Vec<PlannedEntry>, archive: &Path) -> Result<()> {
        let unpacked_root = Self::unpacked_dir(archive);
        if let Some(parent) = archive.parent() {
            std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
        }
        let file = std::fs::File::create(archive).fs_context("creating archive", archive)?;
        let mut builder = tar::Builder::new(file);
        builder.follow_symlinks(false);

        for entry in entries {
            if entry.unpack {
                let dest = unpacked_root.join(&entry.name);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
                }
                match (&entry.kind, entry.transformed) {
                    (FileKind::Symlink { .. }, _) | (_, None) => {
                        std::fs::copy(&entry.source, &dest).fs_context("copying file", &entry.source)?;
                    }
                    (_, Some(Transformed::Content(bytes))) => {
                        std::fs::write(&dest, bytes).fs_context("writing file", &dest)?;
                    }
                    (_, Some(Transformed::Destination(replacement))) => {
                        std::fs::copy(&replacement, &dest).fs_context("copying file", &replacement)?;
                    }
                }
                continue;
            }

            match (&entry.kind, entry.transformed) {
                (FileKind::Symlink { target }, _) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder
                        .append_link(&mut header, &entry.name, target)
                        .fs_context("writing archive entry", &entry.source)?;
                }
                (_, Some(Transformed::Content(bytes))) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_size(bytes.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder
                        .append_data(&mut header, &entry.name, bytes.as_slice())
                        .fs_context("writing archive entry", &entry.source)?;
                }
                (_, Some(Transformed::Destination(replacement))) => {
                    builder
                        .append_path_with_name(&replacement, &entry.name)
                        .fs_context("writing archive entry", &replacement)?;
                }
                (_, None) => {
                    builder
                        .append_path_with_name(&entry.source, &entry.name)
                        .fs_context("writing archive entry", &entry.source)?;
                }
            }
        }

        builder.into_inner().fs_context("finishing archive", archive)?;
        Ok(())
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    fn archive_name(&self) -> &str {
        TAR_ARCHIVE_NAME
    }

    async fn pack(
        &self,
        file_sets: &[FileSet],
        app_root: &Path,
        resources_dir: &Path,
        options: &ArchiveOptions,
    ) -> Result<PathBuf> {
        let archive = resources_dir.join(TAR_ARCHIVE_NAME);
        let entries = Self::plan(file_sets, app_root, options)?;
        let count = entries.len();

        let target = archive.clone();
        tokio::task::spawn_blocking(move || Self::write(entries, &target))
            .await
            .map_err(|e| Error::GenericError(format!("Archive task panicked: {e}")))??;

        log::info!("✓ Packed {count} files into {}", archive.display());
        Ok(archive)
    }

    async fn integrity(&self, resources_dir: &Path, options: &ArchiveOptions) -> Result<ArchiveIntegrity> {
        let archive = resources_dir.join(TAR_ARCHIVE_NAME);
        let size = tokio::fs::metadata(&archive)
            .await
            .fs_context("reading archive metadata", &archive)?
            .len();
        Ok(ArchiveIntegrity {
            algorithm: "SHA256".into(),
            hash: calculate_sha256(&archive).await?,
            size,
            external_allowed: options.external_allowed,
        })
    }

    async fn contains(&self, archive: &Path, relative: &Path) -> Result<bool> {
        if tokio::fs::symlink_metadata(Self::unpacked_dir(archive).join(relative))
            .await
            .is_ok()
        {
            return Ok(true);
        }

        let archive = archive.to_path_buf();
        let wanted = to_slash(relative);
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&archive).fs_context("opening archive", &archive)?;
            let mut reader = tar::Archive::new(file);
            for entry in reader.entries().fs_context("reading archive", &archive)? {
                let entry = entry.fs_context("reading archive", &archive)?;
                let path = entry.path().fs_context("reading archive", &archive)?;
                if to_slash(&path) == wanted {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
        .map_err(|e| Error::GenericError(format!("Archive task panicked: {e}")))?
    }
}
