//! Per-platform packaging pipeline.
//!
//! This module provides the [`PlatformPackager`] that turns the application
//! directory into an unpacked application directory for one platform and
//! architecture, then hands it to the distributable targets.
//!
//! # Pipeline
//!
//! 1. Resolve the unpacked output directory (prepackaged input skips to targets)
//! 2. Stage the runtime shell ([`Framework::prepare_application_stage_directory`])
//! 3. Build extra-resources / extra-files matchers and the shared exclude list
//! 4. Decide the packaging mode (plain copy, prepacked archive, build archive)
//! 5. Copy or pack application files and modules, joined as one batch
//! 7. [`Framework::before_copy_extra_files`] with the archive integrity
//! 9. Copy extra resources, then extra files
//! 11. `after_pack` hook, then [`Framework::after_pack`]
//! 12. Sanity check of the packaged tree
//! 13. [`PlatformHooks::sign_app`]
//! 14. `after_sign` hook
//! 15. Distributable targets
//!
//! Steps 6, 8 and 10 are cancellation checkpoints; every other stage
//! boundary is one as well.

use super::signing::SigningConfig;
use crate::{
    bundler::{
        AppInfo, Arch, ArchiveIntegrity, ArchiveOptions, ArtifactCreated, CompressionLevel, Error,
        Hook, PackContext, PlatformBuildOptions, Result, Settings, TaskManager,
        fileset::{
            self, compute_file_sets, compute_node_module_file_sets, copy_app_files, copy_files,
            get_main_file_matchers, get_node_module_file_matcher, transform_files,
        },
        framework::{BeforeCopyExtraFilesContext, Framework, PrepareContext},
        hooks::ResolvedHook,
        macros::{MacroFields, expand_macro},
        matcher::{
            ALL_FILES_PATTERN, MacroExpander, PatternMatcher, SharedExcludes, get_file_matchers,
            resolve_path,
        },
        naming::{
            self, BEAUTY_ARTIFACT_PATTERN, DEFAULT_ARTIFACT_PATTERN, SAFE_ARTIFACT_PATTERN,
            compute_safe_artifact_name_if_needed,
        },
        platform::{Platform, Target, TargetOptions},
        session::PackagingSession,
        settings::{ArchiveSetting, FilePattern},
        transformer::{FileTransformer, combined_transformer, create_transformer},
    },
    metadata::APP_MANIFEST_FILE,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::OnceCell;

/// Directory below the resources directory holding plain-copied application files.
pub const APP_DIR_NAME: &str = "app";

/// How application files reach the resources directory.
#[derive(Debug, Clone)]
pub enum PackagingMode {
    /// Plain file copy
    Copy,
    /// The application directory already contains the archive
    Prepacked,
    /// Files are packed into an archive
    Build(ArchiveOptions),
}

impl PackagingMode {
    /// Whether the application ends up inside an archive.
    pub fn is_archive(&self) -> bool {
        !matches!(self, PackagingMode::Copy)
    }

    fn archive_options(&self) -> Option<ArchiveOptions> {
        match self {
            PackagingMode::Build(options) => Some(options.clone()),
            _ => None,
        }
    }
}

/// How a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStatus {
    /// Every stage ran
    Completed,
    /// Cancellation was observed at a checkpoint
    Cancelled,
    /// A prepackaged directory was used as is
    Prepackaged,
}

/// Packages the application for one platform.
///
/// Shared behind an `Arc` because distributable targets run as separate
/// tasks and call back into the packager for naming and events.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_package::bundler::{
///     Arch, PackagingSession, Platform, PlatformPackager, Settings, TaskManager,
/// };
/// use std::sync::Arc;
///
/// # async fn example(settings: Arc<Settings>) -> kodegen_bundler_package::bundler::Result<()> {
/// let session = PackagingSession::new();
/// let packager = Arc::new(PlatformPackager::new(settings.clone(), Platform::Linux, &session));
///
/// let mut tasks = TaskManager::new();
/// packager.pack(settings.output_dir(), Arch::X64, Vec::new(), &mut tasks).await?;
/// tasks.await_tasks().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PlatformPackager {
    settings: Arc<Settings>,
    platform: Platform,
    platform_options: PlatformBuildOptions,
    app_info: AppInfo,
    session: PackagingSession,
    resource_list: OnceCell<Vec<String>>,
}

impl PlatformPackager {
    /// Creates a packager; an absent platform section becomes empty options.
    pub fn new(settings: Arc<Settings>, platform: Platform, session: &PackagingSession) -> Self {
        let config = settings.config();
        let platform_options = match platform {
            Platform::Mac => config.mac.clone(),
            Platform::Linux => config.linux.clone(),
            Platform::Windows => config.win.clone(),
        }
        .unwrap_or_default();
        let app_info = AppInfo::new(settings.metadata(), config);

        Self {
            settings,
            platform,
            platform_options,
            app_info,
            session: session.clone(),
            resource_list: OnceCell::new(),
        }
    }

    /// Target platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Shared settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Normalized platform options.
    pub fn platform_options(&self) -> &PlatformBuildOptions {
        &self.platform_options
    }

    /// Application identity.
    pub fn app_info(&self) -> &AppInfo {
        &self.app_info
    }

    /// Session of the run.
    pub fn session(&self) -> &PackagingSession {
        &self.session
    }

    /// Compression level: platform option, then global option, then normal.
    pub fn compression(&self) -> CompressionLevel {
        self.platform_options
            .compression
            .or(self.settings.config().compression)
            .unwrap_or_default()
    }

    /// Whether signing is mandatory: platform option, then global option.
    pub fn force_code_signing(&self) -> bool {
        self.platform_options
            .force_code_signing
            .or(self.settings.config().force_code_signing)
            .unwrap_or(false)
    }

    /// Signing inputs for this platform.
    pub fn signing_config(&self) -> SigningConfig {
        SigningConfig::resolve(self.settings.config(), &self.platform_options)
    }

    /// Packages for `arch` and schedules the targets on `task_manager`.
    ///
    /// Targets are not scheduled when the pipeline was cancelled.
    pub async fn pack(
        self: &Arc<Self>,
        out_dir: &Path,
        arch: Arch,
        targets: Vec<Arc<dyn Target>>,
        task_manager: &mut TaskManager,
    ) -> Result<PackStatus> {
        let app_out_dir = self.compute_app_out_dir(out_dir, arch);
        let status = self.do_pack(out_dir, &app_out_dir, arch, &targets).await?;
        if status == PackStatus::Cancelled {
            log::info!("packaging for {} {arch} cancelled", self.platform);
            return Ok(status);
        }
        self.package_in_distributable_format(app_out_dir, arch, targets, task_manager);
        Ok(status)
    }

    /// `<out_dir>/<platform key><arch suffix>[-unpacked]`, or the prepackaged directory.
    pub fn compute_app_out_dir(&self, out_dir: &Path, arch: Arch) -> PathBuf {
        if let Some(prepackaged) = self.settings.prepackaged() {
            return prepackaged.to_path_buf();
        }
        let unpacked = if self.platform == Platform::Mac { "" } else { "-unpacked" };
        out_dir.join(format!(
            "{}{}{unpacked}",
            self.platform.build_configuration_key(),
            arch.suffix()
        ))
    }

    /// Directory holding application resources inside `app_out_dir`.
    pub fn get_resources_dir(&self, app_out_dir: &Path) -> PathBuf {
        if self.platform == Platform::Mac {
            self.mac_contents_dir(app_out_dir).join("Resources")
        } else if self.settings.framework().supports_archive() {
            app_out_dir.join("resources")
        } else {
            app_out_dir.to_path_buf()
        }
    }

    fn mac_contents_dir(&self, app_out_dir: &Path) -> PathBuf {
        app_out_dir
            .join(format!("{}.app", self.app_info.product_filename))
            .join("Contents")
    }

    /// Manifest merge and module manifest cleanup, then the framework transformer.
    fn main_transformer(&self) -> FileTransformer {
        create_transformer(
            self.settings.app_dir(),
            self.settings.config().extra_metadata.clone(),
            self.settings.framework().create_transformer(),
        )
    }

    fn checkpoint(&self, stage: &str) -> bool {
        if self.session.is_cancelled() {
            log::debug!("cancellation observed before {stage}");
            return true;
        }
        false
    }

    async fn do_pack(
        &self,
        out_dir: &Path,
        app_out_dir: &Path,
        arch: Arch,
        targets: &[Arc<dyn Target>],
    ) -> Result<PackStatus> {
        if self.settings.prepackaged().is_some() {
            log::info!("using prepackaged {}", app_out_dir.display());
            return Ok(PackStatus::Prepackaged);
        }

        let after_pack = self.resolve_hook(self.settings.after_pack())?;
        let after_sign = self.resolve_hook(self.settings.after_sign())?;

        let framework = self.settings.framework();
        log::info!(
            "packaging platform={} arch={arch} {}={} appOutDir={}",
            self.platform.node_name(),
            framework.name(),
            framework.version(),
            app_out_dir.display()
        );

        if self.checkpoint("staging runtime") {
            return Ok(PackStatus::Cancelled);
        }

        framework
            .prepare_application_stage_directory(&PrepareContext {
                app_out_dir,
                platform: self.platform,
                arch,
                version: framework.version(),
                app_info: &self.app_info,
            })
            .await?;

        if self.checkpoint("extra file matchers") {
            return Ok(PackStatus::Cancelled);
        }

        let expander = self.file_macro_expander(arch);
        let extra_resource_matchers = self.get_extra_file_matchers(true, app_out_dir, &expander)?;
        let extra_file_matchers = self.get_extra_file_matchers(false, app_out_dir, &expander)?;
        let excludes = fileset::shared_excludes(
            &[&extra_resource_matchers, &extra_file_matchers],
            self.settings.project_dir(),
        )?;

        if self.checkpoint("packaging mode") {
            return Ok(PackStatus::Cancelled);
        }

        let mode = self.compute_packaging_mode(&expander).await?;
        let ctx = PackContext {
            out_dir: out_dir.to_path_buf(),
            app_out_dir: app_out_dir.to_path_buf(),
            arch,
            targets: targets.iter().map(|t| t.name().to_string()).collect(),
            platform: self.platform,
            platform_name: self.platform.node_name().to_string(),
            product_filename: self.app_info.product_filename.clone(),
            version: self.app_info.version.clone(),
            archive_options: mode.archive_options(),
        };

        if self.checkpoint("copying application files") {
            return Ok(PackStatus::Cancelled);
        }

        let resources_dir = self.get_resources_dir(app_out_dir);
        let mut task_manager = TaskManager::new();
        self.schedule_app_files(&mut task_manager, &mode, &resources_dir, &ctx, &expander, excludes)?;
        task_manager.await_tasks().await?;

        if self.checkpoint("before_copy_extra_files") {
            return Ok(PackStatus::Cancelled);
        }

        let integrity = match &mode {
            PackagingMode::Build(options) => Some(
                self.settings
                    .archiver()
                    .integrity(&resources_dir, options)
                    .await?,
            ),
            _ => None,
        };
        self.before_copy_extra_files(framework.as_ref(), app_out_dir, integrity.as_ref())
            .await?;

        if self.checkpoint("copying extra files") {
            return Ok(PackStatus::Cancelled);
        }

        let transformer = combined_transformer(
            self.settings
                .platform_hooks()
                .create_transformer_for_extra_files(&ctx),
            Some(self.main_transformer()),
        );
        copy_files(&extra_resource_matchers, transformer.as_ref()).await?;
        copy_files(&extra_file_matchers, transformer.as_ref()).await?;

        if self.checkpoint("after_pack") {
            return Ok(PackStatus::Cancelled);
        }

        if let Some(hook) = &after_pack {
            hook.run(&ctx).await?;
        }
        framework.after_pack(&ctx).await?;

        if self.checkpoint("sanity check") {
            return Ok(PackStatus::Cancelled);
        }

        self.sanity_check_package(app_out_dir, &mode).await?;

        if self.checkpoint("signing") {
            return Ok(PackStatus::Cancelled);
        }

        self.sign_app(&ctx, mode.is_archive()).await?;

        if self.checkpoint("after_sign") {
            return Ok(PackStatus::Cancelled);
        }

        if let Some(hook) = &after_sign {
            hook.run(&ctx).await?;
        }

        if self.checkpoint("distributable targets") {
            return Ok(PackStatus::Cancelled);
        }
        Ok(PackStatus::Completed)
    }

    fn resolve_hook(&self, hook: Option<Hook>) -> Result<Option<ResolvedHook>> {
        hook.map(|h| h.resolve(self.settings.project_dir()))
            .transpose()
    }

    async fn before_copy_extra_files(
        &self,
        framework: &dyn Framework,
        app_out_dir: &Path,
        integrity: Option<&ArchiveIntegrity>,
    ) -> Result<()> {
        framework
            .before_copy_extra_files(&BeforeCopyExtraFilesContext {
                app_out_dir,
                platform: self.platform,
                integrity,
            })
            .await
    }

    async fn sign_app(&self, ctx: &PackContext, is_archive: bool) -> Result<()> {
        self.signing_config().check(self.force_code_signing())?;
        self.settings
            .platform_hooks()
            .sign_app(ctx, is_archive)
            .await
    }

    /// Resolves the packaging mode.
    ///
    /// Legacy unpack option names are rejected. The archive setting comes
    /// from the platform section, then the global configuration; absent
    /// means enabled.
    pub async fn compute_packaging_mode(&self, expander: &MacroExpander) -> Result<PackagingMode> {
        let config = self.settings.config();
        let deprecated = |name: &str| {
            Error::Configuration(format!(
                "{name} is deprecated and not supported, please use archive_unpack"
            ))
        };
        if config.legacy_archive_unpack.is_some() {
            return Err(deprecated("archive-unpack"));
        }
        if config.legacy_archive_unpack_dir.is_some() {
            return Err(deprecated("archive-unpack-dir"));
        }

        let setting = self
            .platform_options
            .archive
            .as_ref()
            .or(config.archive.as_ref());
        if let Some(ArchiveSetting::Options(options)) = setting {
            if options.unpack.is_some() {
                return Err(deprecated("archive.unpack"));
            }
            if options.unpack_dir.is_some() {
                return Err(deprecated("archive.unpack_dir"));
            }
        }

        let archiver = self.settings.archiver();
        let app_dir = self.settings.app_dir();
        let prepacked = tokio::fs::metadata(app_dir.join(archiver.archive_name()))
            .await
            .is_ok_and(|m| m.is_file());
        if prepacked {
            log::info!("application directory already contains {}", archiver.archive_name());
            return Ok(PackagingMode::Prepacked);
        }

        if !self.settings.framework().supports_archive() {
            return Ok(PackagingMode::Copy);
        }

        let options = match setting {
            Some(ArchiveSetting::Enabled(false)) => {
                log::warn!(
                    "archive usage is disabled, this is strongly not recommended; enable archive and use archive_unpack for files that must be externally available"
                );
                return Ok(PackagingMode::Copy);
            }
            Some(ArchiveSetting::Options(options)) => options.clone(),
            Some(ArchiveSetting::Enabled(true)) | None => Default::default(),
        };

        let unpack_patterns = self
            .platform_options
            .archive_unpack
            .as_ref()
            .or(config.archive_unpack.as_ref());
        let unpack = match unpack_patterns {
            Some(patterns) if !patterns.is_empty() => {
                let matcher = PatternMatcher::new(
                    app_dir,
                    app_dir,
                    expander.clone(),
                    patterns,
                )?;
                Some(Arc::new(matcher.create_filter()?))
            }
            _ => None,
        };

        let ordering = options
            .ordering
            .as_ref()
            .map(|p| resolve_path(self.settings.project_dir(), &p.to_string_lossy()))
            .transpose()?;

        log::debug!("application files will be packed into {}", archiver.archive_name());
        Ok(PackagingMode::Build(ArchiveOptions {
            smart_unpack: options.smart_unpack.unwrap_or(true),
            ordering,
            external_allowed: options.external_allowed,
            unpack,
        }))
    }

    fn schedule_app_files(
        &self,
        task_manager: &mut TaskManager,
        mode: &PackagingMode,
        resources_dir: &Path,
        ctx: &PackContext,
        expander: &MacroExpander,
        excludes: Option<Arc<SharedExcludes>>,
    ) -> Result<()> {
        let app_dir = self.settings.app_dir().to_path_buf();
        let archive_options = match mode {
            PackagingMode::Prepacked => {
                // The archive is already built; ship the directory untouched
                let matcher = PatternMatcher::new(
                    &app_dir,
                    resources_dir,
                    expander.clone(),
                    &[ALL_FILES_PATTERN.to_string()],
                )?;
                task_manager.add_task(async move {
                    for file_set in compute_file_sets(&[matcher]).await? {
                        copy_app_files(&file_set, None).await?;
                    }
                    Ok(())
                });
                return Ok(());
            }
            PackagingMode::Copy => None,
            PackagingMode::Build(options) => Some(options.clone()),
        };

        let default_destination = resources_dir.join(APP_DIR_NAME);
        let files = merged_patterns(&self.settings.config().files, &self.platform_options.files);
        let mut main_matchers = get_main_file_matchers(
            &app_dir,
            &default_destination,
            &files,
            &ctx.out_dir,
            expander,
        )?;
        let mut node_matcher = if self.settings.node_modules_handled_externally() {
            None
        } else {
            Some(get_node_module_file_matcher(
                &app_dir,
                &default_destination,
                &files,
                expander,
            )?)
        };
        if let Some(excludes) = excludes {
            for matcher in main_matchers.iter_mut().chain(node_matcher.as_mut()) {
                matcher.exclude_patterns = Some(excludes.clone());
            }
        }

        let transformer = self.main_transformer();

        let Some(options) = archive_options else {
            // Without an archive, extra-file transformation applies to app files too
            let combined = combined_transformer(
                self.settings
                    .platform_hooks()
                    .create_transformer_for_extra_files(ctx),
                Some(transformer),
            );

            let app_transformer = combined.clone();
            task_manager.add_task(async move {
                for file_set in compute_file_sets(&main_matchers).await? {
                    if !file_set.is_empty() {
                        copy_app_files(&file_set, app_transformer.as_ref()).await?;
                    }
                }
                Ok(())
            });

            if let Some(node_matcher) = node_matcher {
                task_manager.add_task(async move {
                    for file_set in compute_node_module_file_sets(&node_matcher).await? {
                        if !file_set.is_empty() {
                            copy_app_files(&file_set, combined.as_ref()).await?;
                        }
                    }
                    Ok(())
                });
            }
            return Ok(());
        };

        let archiver = self.settings.archiver().clone();
        let resources_dir = resources_dir.to_path_buf();
        task_manager.add_task(async move {
            let mut file_sets = compute_file_sets(&main_matchers).await?;
            if let Some(node_matcher) = node_matcher {
                file_sets.extend(compute_node_module_file_sets(&node_matcher).await?);
            }
            file_sets.retain(|set| !set.is_empty());

            for file_set in &mut file_sets {
                transform_files(&transformer, file_set).await?;
            }
            let archive = archiver
                .pack(&file_sets, &default_destination, &resources_dir, &options)
                .await?;
            log::debug!("packed application into {}", archive.display());
            Ok(())
        });
        Ok(())
    }

    fn get_extra_file_matchers(
        &self,
        is_resources: bool,
        app_out_dir: &Path,
        expander: &MacroExpander,
    ) -> Result<Vec<PatternMatcher>> {
        let config = self.settings.config();
        let (base, patterns) = if is_resources {
            (
                self.get_resources_dir(app_out_dir),
                merged_patterns(&config.extra_resources, &self.platform_options.extra_resources),
            )
        } else {
            let base = if self.platform == Platform::Mac {
                self.mac_contents_dir(app_out_dir)
            } else {
                app_out_dir.to_path_buf()
            };
            (
                base,
                merged_patterns(&config.extra_files, &self.platform_options.extra_files),
            )
        };
        get_file_matchers(&patterns, self.settings.project_dir(), &base, expander)
    }

    /// Verifies the packaged tree contains the entry file and the manifest.
    pub async fn sanity_check_package(&self, app_out_dir: &Path, mode: &PackagingMode) -> Result<()> {
        match tokio::fs::metadata(app_out_dir).await {
            Err(_) => {
                return Err(Error::SanityCheck {
                    path: app_out_dir.to_path_buf(),
                    message: format!(
                        "Output directory \"{}\" does not exist. Seems like a wrong configuration.",
                        app_out_dir.display()
                    ),
                });
            }
            Ok(metadata) if !metadata.is_dir() => {
                return Err(Error::SanityCheck {
                    path: app_out_dir.to_path_buf(),
                    message: format!(
                        "Output directory \"{}\" is not a directory. Seems like a wrong configuration.",
                        app_out_dir.display()
                    ),
                });
            }
            Ok(_) => {}
        }

        let resources_dir = self.get_resources_dir(app_out_dir);
        let main_file = self
            .settings
            .framework()
            .main_file(self.platform)
            .or_else(|| self.settings.metadata().main.clone())
            .unwrap_or_else(|| "index.js".to_string());

        self.check_file_in_package(&resources_dir, &main_file, "Application entry file", mode)
            .await?;
        self.check_file_in_package(&resources_dir, APP_MANIFEST_FILE, "Application", mode)
            .await
    }

    async fn check_file_in_package(
        &self,
        resources_dir: &Path,
        file: &str,
        message_prefix: &str,
        mode: &PackagingMode,
    ) -> Result<()> {
        let app_dir = self.settings.app_dir();
        let resolved = resolve_path(app_dir, file)?;
        let relative = resolved
            .strip_prefix(app_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(file));

        if mode.is_archive() {
            let archiver = self.settings.archiver();
            let archive = resources_dir.join(archiver.archive_name());
            if !archiver.contains(&archive, &relative).await? {
                return Err(Error::SanityCheck {
                    path: archive.join(&relative),
                    message: format!(
                        "{message_prefix} \"{}\" does not exist in {}. Seems like a wrong configuration.",
                        relative.display(),
                        archive.display()
                    ),
                });
            }
            return Ok(());
        }

        let full_path = resources_dir.join(APP_DIR_NAME).join(&relative);
        match tokio::fs::metadata(&full_path).await {
            Err(_) => Err(Error::SanityCheck {
                message: format!(
                    "{message_prefix} \"{}\" does not exist. Seems like a wrong configuration.",
                    full_path.display()
                ),
                path: full_path,
            }),
            Ok(metadata) if !metadata.is_file() => Err(Error::SanityCheck {
                message: format!(
                    "{message_prefix} \"{}\" is not a file. Seems like a wrong configuration.",
                    full_path.display()
                ),
                path: full_path,
            }),
            Ok(_) => Ok(()),
        }
    }

    fn package_in_distributable_format(
        self: &Arc<Self>,
        app_out_dir: PathBuf,
        arch: Arch,
        targets: Vec<Arc<dyn Target>>,
        task_manager: &mut TaskManager,
    ) {
        if targets.iter().all(|t| t.is_async_supported()) {
            for target in targets {
                let packager = self.clone();
                let app_out_dir = app_out_dir.clone();
                task_manager.add_task(async move { target.build(packager, app_out_dir, arch).await });
            }
            return;
        }

        let packager = self.clone();
        task_manager.add_task(async move {
            let (concurrent, sequential): (Vec<_>, Vec<_>) =
                targets.into_iter().partition(|t| t.is_async_supported());

            // Start every concurrent target before the first sequential one runs
            let mut sub_tasks = TaskManager::new();
            for target in concurrent {
                let packager = packager.clone();
                let app_out_dir = app_out_dir.clone();
                sub_tasks.add_task(async move { target.build(packager, app_out_dir, arch).await });
            }
            sub_tasks.await_tasks().await?;

            for target in sequential {
                target
                    .build(packager.clone(), app_out_dir.clone(), arch)
                    .await?;
            }
            Ok(())
        });
    }

    /// Resolves a resource by name.
    ///
    /// With `custom` set, looks it up in the build resources listing, then
    /// relative to the build resources directory, then relative to the
    /// project directory. Without it, returns the first of `names` present
    /// in the build resources directory.
    pub async fn get_resource(&self, custom: Option<&str>, names: &[&str]) -> Result<Option<PathBuf>> {
        let resources_dir = self.settings.build_resources_dir();
        let listing = self
            .resource_list
            .get_or_init(|| async {
                let mut names = Vec::new();
                if let Ok(mut entries) = tokio::fs::read_dir(resources_dir).await {
                    while let Ok(Some(entry)) = entries.next_entry().await {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                names
            })
            .await;

        let Some(custom) = custom else {
            return Ok(names
                .iter()
                .find(|name| listing.iter().any(|l| l == *name))
                .map(|name| resources_dir.join(name)));
        };
        if custom.trim().is_empty() {
            return Ok(None);
        }
        if listing.iter().any(|l| l == custom) {
            return Ok(Some(resources_dir.join(custom)));
        }

        let candidate = resolve_path(resources_dir, custom)?;
        if tokio::fs::metadata(&candidate).await.is_ok() {
            return Ok(Some(candidate));
        }
        let candidate = resolve_path(self.settings.project_dir(), custom)?;
        if tokio::fs::metadata(&candidate).await.is_ok() {
            return Ok(Some(candidate));
        }

        Err(Error::Configuration(format!(
            "cannot find specified resource \"{custom}\", nor relative to \"{}\", neither relative to project dir (\"{}\")",
            resources_dir.display(),
            self.settings.project_dir().display()
        )))
    }

    /// Expands `pattern` with the platform's `${os}` added to `extra`.
    pub fn expand_macro(
        &self,
        pattern: &str,
        arch: Option<&str>,
        mut extra: MacroFields,
        sanitize: bool,
    ) -> Result<String> {
        extra
            .entry("os".to_string())
            .or_insert_with(|| self.platform.build_configuration_key().to_string());
        expand_macro(pattern, arch, &self.app_info, &extra, sanitize)
    }

    /// Expander used for file patterns, with `${/*}` standing for "the
    /// directory and everything below it".
    pub fn file_macro_expander(&self, arch: Arch) -> MacroExpander {
        let app_info = self.app_info.clone();
        let extra = MacroFields::from([
            ("os".to_string(), self.platform.build_configuration_key().to_string()),
            ("/*".to_string(), "{,/**/*}".to_string()),
        ]);
        Arc::new(move |pattern: &str| expand_macro(pattern, Some(arch.name()), &app_info, &extra, true))
    }

    fn compute_artifact_name(&self, pattern: &str, ext: &str, arch: Option<Arch>) -> Result<String> {
        let arch_name = match self.platform {
            Platform::Mac => None,
            _ => arch.map(|a| a.artifact_name(ext)),
        };
        let extra = MacroFields::from([("ext".to_string(), ext.to_string())]);
        self.expand_macro(pattern, arch_name, extra, true)
    }

    /// Expands the artifact name pattern for `ext`.
    ///
    /// Pattern precedence: target option, platform option, global option,
    /// `default_pattern`, [`DEFAULT_ARTIFACT_PATTERN`]. With
    /// `skip_arch_if_x64` the x64 label is omitted, but only for default
    /// patterns; a user pattern always keeps its arch.
    pub fn expand_artifact_name_pattern(
        &self,
        target_options: Option<&TargetOptions>,
        ext: &str,
        arch: Option<Arch>,
        default_pattern: Option<&str>,
        skip_arch_if_x64: bool,
    ) -> Result<String> {
        let user_pattern = target_options
            .and_then(|o| o.artifact_name.as_deref())
            .or(self.platform_options.artifact_name.as_deref())
            .or(self.settings.config().artifact_name.as_deref());

        let (pattern, skip_arch_if_x64) = match user_pattern {
            Some(pattern) => (pattern, false),
            None => (
                default_pattern.unwrap_or(DEFAULT_ARTIFACT_PATTERN),
                skip_arch_if_x64,
            ),
        };
        let arch = arch.filter(|a| !(skip_arch_if_x64 && *a == Arch::X64));
        self.compute_artifact_name(pattern, ext, arch)
    }

    /// Human facing variant of [`Self::expand_artifact_name_pattern`].
    pub fn expand_artifact_beauty_name_pattern(
        &self,
        target_options: Option<&TargetOptions>,
        ext: &str,
        arch: Option<Arch>,
    ) -> Result<String> {
        self.expand_artifact_name_pattern(target_options, ext, arch, Some(BEAUTY_ARTIFACT_PATTERN), true)
    }

    /// Hosting-safe name for `suggested`, `None` when it already is safe.
    pub fn compute_safe_artifact_name(
        &self,
        suggested: Option<&str>,
        ext: &str,
        arch: Option<Arch>,
        skip_arch_if_x64: bool,
    ) -> Result<Option<String>> {
        let mut failure = None;
        let name = compute_safe_artifact_name_if_needed(suggested, || {
            let arch = arch.filter(|a| !(skip_arch_if_x64 && *a == Arch::X64));
            match self.compute_artifact_name(SAFE_ARTIFACT_PATTERN, ext, arch) {
                Ok(name) => Some(name),
                Err(e) => {
                    failure = Some(e);
                    None
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(name),
        }
    }

    /// `<name>-<version>[-<classifier>][.<ext>]`, see [`naming::generate_name2`].
    pub fn generate_name2(&self, ext: Option<&str>, classifier: Option<&str>, deployment: bool) -> String {
        naming::generate_name2(&self.app_info, ext, classifier, deployment)
    }

    /// Publishes an artifact-created event.
    pub fn dispatch_artifact_created(&self, event: ArtifactCreated) {
        self.settings.notify_artifact_created(&event);
    }
}

fn merged_patterns(global: &Option<Vec<FilePattern>>, platform: &Option<Vec<FilePattern>>) -> Vec<FilePattern> {
    global
        .iter()
        .chain(platform.iter())
        .flatten()
        .cloned()
        .collect()
}
