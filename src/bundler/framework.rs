//! Runtime shell the application is packaged into.
//!
//! The framework owns the layout of the unpacked application directory: it
//! stages the runtime (executable, libraries) before application files are
//! copied and may react to the packed result.

use super::{
    Arch, ArchiveIntegrity, AppInfo, PackContext, Result, platform::Platform,
    transformer::FileTransformer, utils::fs,
};
use async_trait::async_trait;
use std::{fmt, path::{Path, PathBuf}};

/// Arguments of [`Framework::prepare_application_stage_directory`].
#[derive(Debug)]
pub struct PrepareContext<'a> {
    /// Unpacked application directory to fill
    pub app_out_dir: &'a Path,
    /// Platform
    pub platform: Platform,
    /// Architecture
    pub arch: Arch,
    /// Framework version
    pub version: &'a str,
    /// Application identity
    pub app_info: &'a AppInfo,
}

/// Arguments of [`Framework::before_copy_extra_files`].
#[derive(Debug)]
pub struct BeforeCopyExtraFilesContext<'a> {
    /// Unpacked application directory
    pub app_out_dir: &'a Path,
    /// Platform
    pub platform: Platform,
    /// Archive integrity, `None` when files were copied plainly
    pub integrity: Option<&'a ArchiveIntegrity>,
}

/// Runtime shell integration.
#[async_trait]
pub trait Framework: Send + Sync + fmt::Debug {
    /// Framework name, used in logs.
    fn name(&self) -> &str;

    /// Framework version.
    fn version(&self) -> &str;

    /// Whether application files live in a `resources` directory and can be
    /// packed into an archive.
    fn supports_archive(&self) -> bool {
        true
    }

    /// Entry file override for the sanity check.
    fn main_file(&self, _platform: Platform) -> Option<String> {
        None
    }

    /// Transformer run after the application manifest handling.
    fn create_transformer(&self) -> Option<FileTransformer> {
        None
    }

    /// Stages the runtime into the unpacked application directory.
    async fn prepare_application_stage_directory(&self, ctx: &PrepareContext<'_>) -> Result<()>;

    /// Called after application files were copied or packed.
    async fn before_copy_extra_files(&self, _ctx: &BeforeCopyExtraFilesContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called after the caller's `after_pack` hook.
    async fn after_pack(&self, _ctx: &PackContext) -> Result<()> {
        Ok(())
    }
}

/// Framework staging a prebuilt runtime shell directory.
///
/// The shell directory is copied verbatim into the unpacked application
/// directory. Without a shell the directory is only created.
#[derive(Debug, Clone)]
pub struct DirectoryFramework {
    version: String,
    shell_dir: Option<PathBuf>,
    main_file: Option<String>,
}

impl DirectoryFramework {
    /// Creates a framework of the given version without a shell.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            shell_dir: None,
            main_file: None,
        }
    }

    /// Copies `dir` into every unpacked application directory.
    pub fn with_shell_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shell_dir = Some(dir.into());
        self
    }

    /// Overrides the entry file checked by the sanity check.
    pub fn with_main_file(mut self, main: impl Into<String>) -> Self {
        self.main_file = Some(main.into());
        self
    }
}

impl Default for DirectoryFramework {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl Framework for DirectoryFramework {
    fn name(&self) -> &str {
        "directory"
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn main_file(&self, _platform: Platform) -> Option<String> {
        self.main_file.clone()
    }

    async fn prepare_application_stage_directory(&self, ctx: &PrepareContext<'_>) -> Result<()> {
        fs::create_dir_all(ctx.app_out_dir, true).await?;
        if let Some(shell) = &self.shell_dir {
            log::debug!(
                "staging runtime shell {} into {}",
                shell.display(),
                ctx.app_out_dir.display()
            );
            fs::copy_dir(shell, ctx.app_out_dir).await?;
        }
        Ok(())
    }
}
