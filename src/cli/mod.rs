//! Command line interface for the packaging pipeline.
//!
//! This module parses arguments, loads the project manifest, assembles
//! [`Settings`](crate::bundler::Settings) and drives the
//! [`Packager`](crate::bundler::Packager).

mod args;

pub use args::Args;

use crate::{
    bundler::{DirectoryFramework, PackStatus, Packager, PackagingSession, SettingsBuilder},
    error::{CliError, Result},
    metadata::load_manifest,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(args).await
}

/// Runs the packaging pipelines described by `args`.
pub async fn execute(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let manifest = load_manifest(&args.project)?;
    let mut framework = DirectoryFramework::default();
    if let Some(shell_dir) = &args.shell_dir {
        framework = framework.with_shell_dir(shell_dir);
    }

    let artifacts = Arc::new(AtomicUsize::new(0));
    let counter = artifacts.clone();
    let mut builder = SettingsBuilder::new()
        .project_dir(&args.project)
        .metadata(manifest.metadata)
        .config(manifest.config)
        .framework(framework)
        .on_artifact_created(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    if let Some(output) = &args.output {
        builder = builder.output_dir(output);
    }
    if let Some(prepackaged) = &args.prepackaged {
        builder = builder.prepackaged(prepackaged);
    }
    let settings = Arc::new(builder.build()?);

    let session = PackagingSession::new().retain_stage_dirs(args.keep_stage_dirs);
    let cancellation = session.cancellation_token().clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, stopping at the next stage boundary");
            cancellation.cancel();
        }
    });

    let packager = Packager::new(settings, session);
    let result = packager
        .build(&args.platforms(), &args.archs(), &args.targets)
        .await;
    ctrl_c.abort();

    let outcomes = result?;
    for outcome in &outcomes {
        match outcome.status {
            PackStatus::Cancelled => log::warn!("{} {} cancelled", outcome.platform, outcome.arch),
            status => log::info!("{} {}: {:?}", outcome.platform, outcome.arch, status),
        }
    }
    log::info!("{} artifact(s) created", artifacts.load(Ordering::Relaxed));

    let cancelled = outcomes.iter().any(|o| o.status == PackStatus::Cancelled);
    Ok(if cancelled { 130 } else { 0 })
}
