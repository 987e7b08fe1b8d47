//! Runs packaging pipelines for several platforms and architectures.

use super::orchestrator::{PackStatus, PlatformPackager};
use crate::bundler::{
    Arch, Error, Result, Settings, TaskManager,
    platform::{Platform, Target, create_target},
    session::PackagingSession,
};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

/// Result of one (platform, arch) pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Platform of the pipeline
    pub platform: Platform,
    /// Architecture of the pipeline
    pub arch: Arch,
    /// How the pipeline ended
    pub status: PackStatus,
}

/// Drives one pipeline per (platform, arch) pair.
///
/// Pipelines are independent tasks joined by a [`TaskManager`]; a failing
/// pipeline does not stop its siblings.
#[derive(Debug)]
pub struct Packager {
    settings: Arc<Settings>,
    session: PackagingSession,
}

impl Packager {
    /// Creates a driver sharing `session` with all pipelines.
    pub fn new(settings: Arc<Settings>, session: PackagingSession) -> Self {
        Self { settings, session }
    }

    /// Session of the run; cancel it to stop every pipeline at its next checkpoint.
    pub fn session(&self) -> &PackagingSession {
        &self.session
    }

    /// Packages every combination of `platforms` and `archs`.
    ///
    /// `targets` overrides the platform `target` option, which overrides
    /// [`Platform::default_targets`]. Outcomes are returned in
    /// (platform, arch) order.
    ///
    /// When exactly one pipeline fails its error is returned as raised, so a
    /// hook failure reaches the caller unwrapped. Several failures come back
    /// as [`Error::TaskBatch`]; [`Error::root`] gives the first.
    pub async fn build(
        &self,
        platforms: &[Platform],
        archs: &[Arch],
        targets: &[String],
    ) -> Result<Vec<PipelineOutcome>> {
        let out_dir = self.settings.output_dir().to_path_buf();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let mut task_manager = TaskManager::new();

        for &platform in platforms {
            let packager = Arc::new(PlatformPackager::new(
                self.settings.clone(),
                platform,
                &self.session,
            ));
            let target_names = self.target_names(&packager, targets);

            for &arch in archs {
                let packager = packager.clone();
                let out_dir = out_dir.clone();
                let outcomes = outcomes.clone();
                let pipeline_targets = create_targets(&target_names, &out_dir)?;

                task_manager.add_task(async move {
                    log::debug!("starting pipeline {platform} {arch}");
                    let mut targets_manager = TaskManager::new();
                    let status = packager
                        .pack(&out_dir, arch, pipeline_targets, &mut targets_manager)
                        .await?;
                    targets_manager.await_tasks().await?;

                    if let Ok(mut outcomes) = outcomes.lock() {
                        outcomes.push(PipelineOutcome { platform, arch, status });
                    }
                    Ok(())
                });
            }
        }

        task_manager
            .await_tasks()
            .await
            .map_err(Error::into_single_failure)?;

        let mut outcomes = match Arc::try_unwrap(outcomes) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(shared) => shared.lock().map(|o| o.clone()).unwrap_or_default(),
        };
        outcomes.sort_by_key(|o| {
            (
                platforms.iter().position(|p| *p == o.platform),
                archs.iter().position(|a| *a == o.arch),
            )
        });
        Ok(outcomes)
    }

    fn target_names(&self, packager: &PlatformPackager, requested: &[String]) -> Vec<String> {
        if !requested.is_empty() {
            return requested.to_vec();
        }
        if let Some(configured) = &packager.platform_options().target
            && !configured.is_empty()
        {
            return configured.clone();
        }
        packager
            .platform()
            .default_targets()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }
}

fn create_targets(names: &[String], out_dir: &Path) -> Result<Vec<Arc<dyn Target>>> {
    names.iter().map(|name| create_target(name, out_dir)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bundler::{Configuration, SettingsBuilder, settings::PlatformBuildOptions},
        metadata::AppMetadata,
    };

    fn settings(config: Configuration) -> (tempfile::TempDir, Arc<Settings>) {
        let project = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::new()
            .project_dir(project.path())
            .metadata(AppMetadata {
                name: "foo".into(),
                version: "1.0.0".into(),
                ..Default::default()
            })
            .config(config)
            .build()
            .unwrap();
        (project, Arc::new(settings))
    }

    #[test]
    fn target_names_precedence() {
        let config = Configuration {
            linux: Some(PlatformBuildOptions {
                target: Some(vec!["dir".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (_dir, settings) = settings(config);
        let driver = Packager::new(settings.clone(), PackagingSession::new());

        let linux = PlatformPackager::new(settings.clone(), Platform::Linux, driver.session());
        assert_eq!(driver.target_names(&linux, &["tar.gz".into()]), vec!["tar.gz"]);
        assert_eq!(driver.target_names(&linux, &[]), vec!["dir"]);

        let win = PlatformPackager::new(settings, Platform::Windows, driver.session());
        assert_eq!(driver.target_names(&win, &[]), vec!["tar.gz"]);
    }

    #[tokio::test]
    async fn unknown_target_is_rejected_before_packaging() {
        let (_dir, settings) = settings(Configuration::default());
        let driver = Packager::new(settings, PackagingSession::new());
        let err = driver
            .build(&[Platform::Linux], &[Arch::X64], &["nsis".into()])
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
