//! Builder for constructing Settings.

use super::{Configuration, Settings};
use crate::{
    bundler::{
        Archiver, ArtifactCreated, ArtifactListener, DefaultPlatformHooks, Error, Framework, Hook,
        PlatformHooks, Result, TarArchiver,
    },
    metadata::AppMetadata,
};
use path_absolutize::Absolutize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Default output directory, relative to the project.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Default build resources directory, relative to the project.
pub const DEFAULT_BUILD_RESOURCES_DIR: &str = "build";

/// Builder for constructing [`Settings`].
///
/// Provides a fluent API with validation. `project_dir` and `metadata` are
/// required; directories default to the values in
/// [`Configuration::directories`], then to `dist` and `build` below the
/// project.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_package::bundler::{SettingsBuilder, Hook};
/// use kodegen_bundler_package::metadata::AppMetadata;
///
/// # fn example() -> kodegen_bundler_package::bundler::Result<()> {
/// let settings = SettingsBuilder::new()
///     .project_dir("my-app")
///     .metadata(AppMetadata {
///         name: "my-app".into(),
///         version: "1.0.0".into(),
///         ..Default::default()
///     })
///     .after_pack(Hook::inline(|ctx| async move {
///         println!("{}", ctx.app_out_dir.display());
///         Ok(())
///     }))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    project_dir: Option<PathBuf>,
    app_dir: Option<PathBuf>,
    build_resources_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config: Configuration,
    metadata: Option<AppMetadata>,
    framework: Option<Arc<dyn Framework>>,
    archiver: Option<Arc<dyn Archiver>>,
    platform_hooks: Option<Arc<dyn PlatformHooks>>,
    after_pack: Option<Hook>,
    after_sign: Option<Hook>,
    prepackaged: Option<PathBuf>,
    node_modules_handled_externally: bool,
    artifact_listener: Option<ArtifactListener>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the project directory.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn project_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the application directory (default: `directories.app`, then the project dir).
    pub fn app_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.app_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the build resources directory.
    pub fn build_resources_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.build_resources_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the output directory.
    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the build configuration.
    ///
    /// Default: empty [`Configuration`]
    pub fn config(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    /// Sets application metadata.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn metadata(mut self, metadata: AppMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the runtime shell integration.
    ///
    /// Default: [`DirectoryFramework`](crate::bundler::DirectoryFramework) without a shell
    pub fn framework(mut self, framework: impl Framework + 'static) -> Self {
        self.framework = Some(Arc::new(framework));
        self
    }

    /// Sets the archive format.
    ///
    /// Default: [`TarArchiver`]
    pub fn archiver(mut self, archiver: impl Archiver + 'static) -> Self {
        self.archiver = Some(Arc::new(archiver));
        self
    }

    /// Sets platform hooks (signing, extra file transformer).
    ///
    /// Default: [`DefaultPlatformHooks`]
    pub fn platform_hooks(mut self, hooks: impl PlatformHooks + 'static) -> Self {
        self.platform_hooks = Some(Arc::new(hooks));
        self
    }

    /// Sets the `after_pack` hook, overriding the configured one.
    pub fn after_pack(mut self, hook: Hook) -> Self {
        self.after_pack = Some(hook);
        self
    }

    /// Sets the `after_sign` hook, overriding the configured one.
    pub fn after_sign(mut self, hook: Hook) -> Self {
        self.after_sign = Some(hook);
        self
    }

    /// Uses an already packaged application directory.
    pub fn prepackaged<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.prepackaged = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skips copying `node_modules`.
    pub fn node_modules_handled_externally(mut self, handled: bool) -> Self {
        self.node_modules_handled_externally = handled;
        self
    }

    /// Receives an event for every artifact written by a target.
    pub fn on_artifact_created<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ArtifactCreated) + Send + Sync + 'static,
    {
        self.artifact_listener = Some(Arc::new(listener));
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `project_dir` or `metadata` is missing, or if
    /// the application directory does not exist.
    pub fn build(self) -> Result<Settings> {
        use crate::bundler::error::Context;

        let project_dir = self.project_dir.context("project_dir is required")?;
        let project_dir = project_dir
            .absolutize()
            .map_err(Error::IoError)?
            .into_owned();
        let metadata = self.metadata.context("metadata is required")?;

        let directories = &self.config.directories;
        let resolve = |explicit: Option<PathBuf>, configured: Option<&PathBuf>, default: &str| {
            let path = explicit
                .or_else(|| configured.cloned())
                .unwrap_or_else(|| PathBuf::from(default));
            absolute(&path, &project_dir)
        };

        let app_dir = resolve(self.app_dir, directories.app.as_ref(), ".")?;
        if !app_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "application directory {} does not exist",
                app_dir.display()
            )));
        }
        let build_resources_dir = resolve(
            self.build_resources_dir,
            directories.build_resources.as_ref(),
            DEFAULT_BUILD_RESOURCES_DIR,
        )?;
        let output_dir = resolve(self.output_dir, directories.output.as_ref(), DEFAULT_OUTPUT_DIR)?;
        let prepackaged = self
            .prepackaged
            .map(|p| absolute(&p, &project_dir))
            .transpose()?;

        Ok(Settings::new(
            project_dir,
            app_dir,
            build_resources_dir,
            output_dir,
            self.config,
            metadata,
            self.framework
                .unwrap_or_else(|| Arc::new(crate::bundler::DirectoryFramework::default())),
            self.archiver.unwrap_or_else(|| Arc::new(TarArchiver)),
            self.platform_hooks
                .unwrap_or_else(|| Arc::new(DefaultPlatformHooks)),
            self.after_pack,
            self.after_sign,
            prepackaged,
            self.node_modules_handled_externally,
            self.artifact_listener,
        ))
    }
}

fn absolute(path: &Path, base: &Path) -> Result<PathBuf> {
    path.absolutize_from(base)
        .map(|p| p.into_owned())
        .map_err(Error::IoError)
}
