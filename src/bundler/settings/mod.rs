//! Configuration structures for packaging operations.
//!
//! This module provides the serde-backed build configuration, the
//! application identity derived from metadata, and the builder assembling
//! [`Settings`] for a packaging run.

mod app_info;
mod arch;
mod builder;
mod config;
mod core;

// Re-export all public types
pub use app_info::{AppInfo, portable_file_name, sanitize_file_name};
pub use arch::Arch;
pub use builder::{DEFAULT_BUILD_RESOURCES_DIR, DEFAULT_OUTPUT_DIR, SettingsBuilder};
pub use config::{
    ArchiveConfig, ArchiveSetting, CompressionLevel, Configuration, Directories, FilePattern,
    PlatformBuildOptions,
};
pub use core::Settings;
