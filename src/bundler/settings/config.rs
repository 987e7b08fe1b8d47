//! Build configuration shared by all platforms.

use serde::Deserialize;
use std::path::PathBuf;

/// Build configuration.
///
/// Read from `kodegen-package.toml` in the project root or from the `build`
/// key of the application manifest (`package.json`).
///
/// # Example
///
/// ```toml
/// product_name = "Foo App"
/// artifact_name = "${productName}-${version}-${arch}.${ext}"
/// files = ["**/*", "!**/*.map"]
/// extra_resources = [{ from = "assets", to = "assets" }]
/// archive_unpack = ["**/*.node"]
///
/// [linux]
/// archive = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Human readable product name, overrides the manifest `productName`.
    pub product_name: Option<String>,

    /// Default artifact name pattern.
    pub artifact_name: Option<String>,

    /// Compression level for distributable targets.
    pub compression: Option<CompressionLevel>,

    /// Application file patterns.
    pub files: Option<Vec<FilePattern>>,

    /// Files copied into the resources directory.
    pub extra_resources: Option<Vec<FilePattern>>,

    /// Files copied into the application content directory.
    pub extra_files: Option<Vec<FilePattern>>,

    /// Whether to pack the application into a single-file archive.
    pub archive: Option<ArchiveSetting>,

    /// Patterns of files kept on disk next to the archive.
    pub archive_unpack: Option<Vec<String>>,

    /// Metadata merged into the packaged application manifest.
    pub extra_metadata: Option<serde_json::Value>,

    /// Hook run after the application is packed (path to an executable).
    pub after_pack: Option<String>,

    /// Hook run after the application is signed (path to an executable).
    pub after_sign: Option<String>,

    /// Fail when code signing is not configured.
    pub force_code_signing: Option<bool>,

    /// Code signing certificate link (file path, URL or base64).
    pub csc_link: Option<String>,

    /// Code signing certificate password.
    pub csc_key_password: Option<String>,

    /// Project directories.
    pub directories: Directories,

    /// macOS options.
    pub mac: Option<PlatformBuildOptions>,

    /// Linux options.
    pub linux: Option<PlatformBuildOptions>,

    /// Windows options.
    pub win: Option<PlatformBuildOptions>,

    /// Legacy `archive-unpack` key, rejected.
    #[serde(rename = "archive-unpack")]
    pub legacy_archive_unpack: Option<serde_json::Value>,

    /// Legacy `archive-unpack-dir` key, rejected.
    #[serde(rename = "archive-unpack-dir")]
    pub legacy_archive_unpack_dir: Option<serde_json::Value>,
}

/// Per-platform build options.
///
/// Every field overrides the global value of the same name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatformBuildOptions {
    /// Artifact name pattern.
    pub artifact_name: Option<String>,

    /// Compression level.
    pub compression: Option<CompressionLevel>,

    /// Additional application file patterns.
    pub files: Option<Vec<FilePattern>>,

    /// Additional extra resources.
    pub extra_resources: Option<Vec<FilePattern>>,

    /// Additional extra files.
    pub extra_files: Option<Vec<FilePattern>>,

    /// Archive setting.
    pub archive: Option<ArchiveSetting>,

    /// Unpack patterns.
    pub archive_unpack: Option<Vec<String>>,

    /// Force code signing.
    pub force_code_signing: Option<bool>,

    /// Code signing certificate link.
    pub csc_link: Option<String>,

    /// Code signing certificate password.
    pub csc_key_password: Option<String>,

    /// Default targets for the platform.
    pub target: Option<Vec<String>>,
}

/// Project directory layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Directories {
    /// Output directory (default `dist`).
    pub output: Option<PathBuf>,

    /// Build resources directory (default `build`).
    pub build_resources: Option<PathBuf>,

    /// Application directory (default: project dir).
    pub app: Option<PathBuf>,
}

/// Compression level used by distributable targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// No compression
    Store,
    /// Balanced
    #[default]
    Normal,
    /// Best ratio
    Maximum,
}

impl CompressionLevel {
    /// Corresponding `flate2` level.
    pub fn flate2(self) -> flate2::Compression {
        match self {
            CompressionLevel::Store => flate2::Compression::none(),
            CompressionLevel::Normal => flate2::Compression::default(),
            CompressionLevel::Maximum => flate2::Compression::best(),
        }
    }
}

/// An entry of `files`, `extra_resources` or `extra_files`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilePattern {
    /// A glob pattern relative to the default source directory.
    Pattern(String),

    /// A mapping from a source to a destination with its own filter.
    Set {
        /// Source, relative to the project dir
        #[serde(default)]
        from: Option<String>,
        /// Destination, relative to the group base
        #[serde(default)]
        to: Option<String>,
        /// Patterns applied under `from`
        #[serde(default)]
        filter: Vec<String>,
    },
}

/// `archive` option: a flag or a table of options.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ArchiveSetting {
    /// Enable or disable archiving with default options.
    Enabled(bool),
    /// Enable archiving with options.
    Options(ArchiveConfig),
}

/// Archive options as written in configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Unpack native modules automatically.
    pub smart_unpack: Option<bool>,

    /// File with the preferred ordering of archive entries.
    pub ordering: Option<PathBuf>,

    /// Allow files outside the archive when computing integrity.
    pub external_allowed: bool,

    /// Legacy key, rejected.
    pub unpack: Option<serde_json::Value>,

    /// Legacy key, rejected.
    pub unpack_dir: Option<serde_json::Value>,
}
