//! Application packaging pipeline.
//!
//! Turns a built application tree into platform specific packages: files are
//! selected with ordered glob rules, transformed, copied or packed into an
//! archive, checked, signed and finally handed to distributable targets.
//!
//! # Overview
//!
//! - [`Settings`] / [`SettingsBuilder`] describe the project and its configuration
//! - [`PlatformPackager`] runs the pipeline for one platform and architecture
//! - [`Packager`] runs every (platform, arch) pipeline concurrently
//! - [`Framework`], [`Archiver`], [`PlatformHooks`] and [`Target`] are the
//!   extension points, with [`DirectoryFramework`], [`TarArchiver`],
//!   [`DefaultPlatformHooks`] and the `dir` / `tar.gz` targets as built-in
//!   implementations
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_package::bundler::{
//!     Arch, Packager, PackagingSession, Platform, SettingsBuilder,
//! };
//! use kodegen_bundler_package::metadata::load_manifest;
//! use std::sync::Arc;
//!
//! # async fn example() -> kodegen_bundler_package::bundler::Result<()> {
//! let manifest = load_manifest("my-app".as_ref())?;
//! let settings = SettingsBuilder::new()
//!     .project_dir("my-app")
//!     .metadata(manifest.metadata)
//!     .config(manifest.config)
//!     .build()?;
//!
//! let packager = Packager::new(Arc::new(settings), PackagingSession::new());
//! packager
//!     .build(&[Platform::Linux], &[Arch::X64, Arch::Arm64], &["tar.gz".into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod artifact;
pub mod builder;
pub mod error;
pub mod fileset;
pub mod framework;
pub mod hooks;
pub mod macros;
pub mod matcher;
pub mod naming;
pub mod platform;
pub mod session;
pub mod settings;
pub mod task_manager;
pub mod transformer;
pub mod utils;

pub use archive::{ArchiveIntegrity, ArchiveOptions, Archiver, TarArchiver};
pub use artifact::{ArtifactCreated, ArtifactListener};
pub use builder::{PackStatus, Packager, PackagingMode, PipelineOutcome, PlatformPackager};
pub use error::{Context, Error, ErrorExt, Result};
pub use fileset::{FileEntry, FileKind, FileSet};
pub use framework::{DirectoryFramework, Framework};
pub use hooks::{Hook, PackContext, ResolvedHook};
pub use macros::{MacroFields, expand_macro};
pub use matcher::{MacroExpander, PatternMatcher};
pub use platform::{DefaultPlatformHooks, Platform, PlatformHooks, Target, TargetOptions};
pub use session::{PackagingSession, StageDir, TempDirManager};
pub use settings::{
    AppInfo, Arch, ArchiveSetting, CompressionLevel, Configuration, FilePattern,
    PlatformBuildOptions, Settings, SettingsBuilder,
};
pub use task_manager::TaskManager;
pub use transformer::{FileTransformer, Transformed};
