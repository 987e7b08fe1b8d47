//! Bundled distributable targets.

use super::{Target, TargetOptions};
use crate::bundler::{
    Arch, ArtifactCreated, Error, ErrorExt, PlatformPackager, Result, builder::calculate_sha256,
    session::StageDir, utils::fs,
};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Creates the target called `name` writing into `out_dir`.
pub fn create_target(name: &str, out_dir: &Path) -> Result<Arc<dyn Target>> {
    match name {
        "dir" => Ok(Arc::new(DirTarget)),
        "tar.gz" | "tgz" => Ok(Arc::new(TarGzTarget::new(out_dir))),
        other => Err(Error::Configuration(format!("unknown target: {other}"))),
    }
}

/// Leaves the unpacked application directory as the result.
#[derive(Debug, Clone, Default)]
pub struct DirTarget;

#[async_trait]
impl Target for DirTarget {
    fn name(&self) -> &str {
        "dir"
    }

    fn is_async_supported(&self) -> bool {
        false
    }

    async fn build(&self, _packager: Arc<PlatformPackager>, app_out_dir: PathBuf, arch: Arch) -> Result<()> {
        log::info!("✓ Unpacked application ({arch}): {}", app_out_dir.display());
        Ok(())
    }
}

/// Compresses the unpacked application directory into a `.tar.gz`.
#[derive(Debug, Clone)]
pub struct TarGzTarget {
    out_dir: PathBuf,
    options: TargetOptions,
}

impl TarGzTarget {
    /// Creates a target writing into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            options: TargetOptions::default(),
        }
    }

    /// Overrides target options.
    pub fn with_options(mut self, options: TargetOptions) -> Self {
        self.options = options;
        self
    }
}

const EXT: &str = "tar.gz";

#[async_trait]
impl Target for TarGzTarget {
    fn name(&self) -> &str {
        EXT
    }

    fn options(&self) -> Option<&TargetOptions> {
        Some(&self.options)
    }

    async fn build(&self, packager: Arc<PlatformPackager>, app_out_dir: PathBuf, arch: Arch) -> Result<()> {
        let artifact_name = packager.expand_artifact_name_pattern(self.options(), EXT, Some(arch), None, true)?;
        let artifact = self.out_dir.join(&artifact_name);
        log::info!("Building {EXT} for {arch}: {}", artifact.display());

        let stage = StageDir::new(packager.session(), "tar-gz").await?;
        let temp = stage.temp_file(&artifact_name);
        let level = packager.compression().flate2();
        let root_name = app_out_dir
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(packager.app_info().product_filename.as_str()));

        let source = app_out_dir.clone();
        let destination = temp.clone();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::create(&destination).fs_context("creating artifact", &destination)?;
            let mut builder = tar::Builder::new(GzEncoder::new(file, level));
            builder.follow_symlinks(false);
            builder
                .append_dir_all(&root_name, &source)
                .fs_context("archiving directory", &source)?;
            builder
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .fs_context("finishing artifact", &destination)?;
            Ok::<_, Error>(())
        })
        .await
        .map_err(|e| Error::GenericError(format!("Archive task panicked: {e}")))??;

        fs::copy_file(&temp, &artifact).await?;
        let checksum = calculate_sha256(&artifact).await?;
        let safe_artifact_name = packager.compute_safe_artifact_name(Some(&artifact_name), EXT, Some(arch), true)?;

        packager.dispatch_artifact_created(ArtifactCreated {
            file: artifact,
            safe_artifact_name,
            target: Some(EXT.to_string()),
            arch: Some(arch),
            checksum: Some(checksum),
        });
        Ok(())
    }
}
