//! Core Settings struct and implementations.

use super::Configuration;
use crate::{
    bundler::{
        Archiver, ArtifactCreated, ArtifactListener, Framework, Hook, PlatformHooks,
    },
    metadata::AppMetadata,
};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Everything a packaging run needs besides the per-pipeline platform and
/// architecture.
///
/// Constructed via [`SettingsBuilder`](super::SettingsBuilder) and shared by
/// all pipelines behind an `Arc`.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_package::bundler::{SettingsBuilder, DirectoryFramework};
/// use kodegen_bundler_package::metadata::load_manifest;
///
/// # fn example() -> kodegen_bundler_package::bundler::Result<()> {
/// let manifest = load_manifest("my-app".as_ref())?;
/// let settings = SettingsBuilder::new()
///     .project_dir("my-app")
///     .metadata(manifest.metadata)
///     .config(manifest.config)
///     .framework(DirectoryFramework::new("1.0.0"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Settings {
    project_dir: PathBuf,
    app_dir: PathBuf,
    build_resources_dir: PathBuf,
    output_dir: PathBuf,
    config: Configuration,
    metadata: AppMetadata,
    framework: Arc<dyn Framework>,
    archiver: Arc<dyn Archiver>,
    platform_hooks: Arc<dyn PlatformHooks>,
    after_pack: Option<Hook>,
    after_sign: Option<Hook>,
    prepackaged: Option<PathBuf>,
    node_modules_handled_externally: bool,
    artifact_listener: Option<ArtifactListener>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("project_dir", &self.project_dir)
            .field("app_dir", &self.app_dir)
            .field("build_resources_dir", &self.build_resources_dir)
            .field("output_dir", &self.output_dir)
            .field("framework", &self.framework)
            .field("archiver", &self.archiver)
            .field("prepackaged", &self.prepackaged)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Project root; relative configuration paths resolve against it.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory holding the application manifest and files.
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// Build resources directory (icons, scripts).
    pub fn build_resources_dir(&self) -> &Path {
        &self.build_resources_dir
    }

    /// Output directory for unpacked directories and artifacts.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Build configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Application metadata.
    pub fn metadata(&self) -> &AppMetadata {
        &self.metadata
    }

    /// Runtime shell integration.
    pub fn framework(&self) -> &Arc<dyn Framework> {
        &self.framework
    }

    /// Archive format.
    pub fn archiver(&self) -> &Arc<dyn Archiver> {
        &self.archiver
    }

    /// Platform-specific hooks.
    pub fn platform_hooks(&self) -> &Arc<dyn PlatformHooks> {
        &self.platform_hooks
    }

    /// `after_pack` hook: explicit hook, else the configured program.
    pub fn after_pack(&self) -> Option<Hook> {
        self.after_pack.clone().or_else(|| {
            self.config
                .after_pack
                .as_ref()
                .map(|path| Hook::external(path.clone(), "afterPack"))
        })
    }

    /// `after_sign` hook: explicit hook, else the configured program.
    pub fn after_sign(&self) -> Option<Hook> {
        self.after_sign.clone().or_else(|| {
            self.config
                .after_sign
                .as_ref()
                .map(|path| Hook::external(path.clone(), "afterSign"))
        })
    }

    /// Already packaged application directory; skips straight to targets.
    pub fn prepackaged(&self) -> Option<&Path> {
        self.prepackaged.as_deref()
    }

    /// Whether third-party modules are installed by someone else.
    pub fn node_modules_handled_externally(&self) -> bool {
        self.node_modules_handled_externally
    }

    /// Notifies the listener (if any) and logs the artifact.
    pub fn notify_artifact_created(&self, event: &ArtifactCreated) {
        log::info!("✓ Created artifact: {event}");
        if let Some(listener) = &self.artifact_listener {
            listener(event);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        project_dir: PathBuf,
        app_dir: PathBuf,
        build_resources_dir: PathBuf,
        output_dir: PathBuf,
        config: Configuration,
        metadata: AppMetadata,
        framework: Arc<dyn Framework>,
        archiver: Arc<dyn Archiver>,
        platform_hooks: Arc<dyn PlatformHooks>,
        after_pack: Option<Hook>,
        after_sign: Option<Hook>,
        prepackaged: Option<PathBuf>,
        node_modules_handled_externally: bool,
        artifact_listener: Option<ArtifactListener>,
    ) -> Self {
        Self {
            project_dir,
            app_dir,
            build_resources_dir,
            output_dir,
            config,
            metadata,
            framework,
            archiver,
            platform_hooks,
            after_pack,
            after_sign,
            prepackaged,
            node_modules_handled_externally,
            artifact_listener,
        }
    }
}
