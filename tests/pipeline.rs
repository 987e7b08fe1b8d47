//! End-to-end packaging pipeline tests.

mod common;

use async_trait::async_trait;
use common::{fixture_project, tar_entries, tar_gz_entries, write_config};
use kodegen_bundler_package::{
    bundler::{
        Arch, ArchiveIntegrity, ArtifactCreated, Error, FileTransformer, Framework, Hook,
        PackContext, PackStatus, Packager, PackagingSession, Platform, PlatformPackager, Result,
        Settings, SettingsBuilder, Target, TaskManager, Transformed,
        framework::{BeforeCopyExtraFilesContext, PrepareContext},
        platform::create_target,
        utils::fs,
    },
    metadata::load_manifest,
};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events.lock().unwrap().push(event.into());
}

fn snapshot(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

/// Framework recording its calls.
///
/// Its transformer can cancel the session, delay module files, log the
/// files it sees in call order and rewrite `.txt` files.
#[derive(Debug, Default)]
struct RecordingFramework {
    events: Events,
    cancel_on_copy: Option<PackagingSession>,
    slow_node_modules: bool,
    rewrite_txt: bool,
    transformed: Option<Events>,
    integrity: Arc<Mutex<Option<ArchiveIntegrity>>>,
    files_seen_before_extra: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Framework for RecordingFramework {
    fn name(&self) -> &str {
        "recording"
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    fn create_transformer(&self) -> Option<FileTransformer> {
        if self.cancel_on_copy.is_none()
            && !self.slow_node_modules
            && !self.rewrite_txt
            && self.transformed.is_none()
        {
            return None;
        }
        let session = self.cancel_on_copy.clone();
        let slow = self.slow_node_modules;
        let rewrite = self.rewrite_txt;
        let transformed = self.transformed.clone();
        Some(Arc::new(move |file: &Path| {
            if slow && file.components().any(|c| c.as_os_str() == "node_modules") {
                std::thread::sleep(Duration::from_millis(50));
            }
            if let Some(session) = &session {
                session.cancel();
            }
            if let Some(transformed) = &transformed {
                record(transformed, file.to_string_lossy());
            }
            if rewrite && file.extension().is_some_and(|e| e == "txt") {
                return Ok(Some(Transformed::Content(b"TRANSFORMED".to_vec())));
            }
            Ok(None)
        }))
    }

    async fn prepare_application_stage_directory(&self, ctx: &PrepareContext<'_>) -> Result<()> {
        record(&self.events, "prepare");
        fs::create_dir_all(ctx.app_out_dir, true).await
    }

    async fn before_copy_extra_files(&self, ctx: &BeforeCopyExtraFilesContext<'_>) -> Result<()> {
        record(&self.events, "before_copy_extra_files");
        *self.integrity.lock().unwrap() = ctx.integrity.cloned();

        let app = ctx.app_out_dir.join("resources/app");
        let seen = walkdir::WalkDir::new(&app)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(&app).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        *self.files_seen_before_extra.lock().unwrap() = seen;
        Ok(())
    }

    async fn after_pack(&self, _ctx: &PackContext) -> Result<()> {
        record(&self.events, "framework after_pack");
        Ok(())
    }
}

/// Target recording when it starts and finishes.
#[derive(Debug)]
struct RecordingTarget {
    name: &'static str,
    concurrent: bool,
    delay: Duration,
    events: Events,
}

#[async_trait]
impl Target for RecordingTarget {
    fn name(&self) -> &str {
        self.name
    }

    fn is_async_supported(&self) -> bool {
        self.concurrent
    }

    async fn build(&self, _packager: Arc<PlatformPackager>, app_out_dir: PathBuf, arch: Arch) -> Result<()> {
        record(&self.events, format!("start:{}", self.name));
        assert!(app_out_dir.is_dir());
        assert_eq!(arch, Arch::X64);
        tokio::time::sleep(self.delay).await;
        record(&self.events, format!("end:{}", self.name));
        Ok(())
    }
}

fn settings_builder(project: &Path) -> SettingsBuilder {
    let manifest = load_manifest(project).unwrap();
    SettingsBuilder::new()
        .project_dir(project)
        .metadata(manifest.metadata)
        .config(manifest.config)
}

async fn pack_linux(
    settings: Settings,
    session: &PackagingSession,
    targets: Vec<Arc<dyn Target>>,
) -> Result<(PackStatus, PathBuf)> {
    let settings = Arc::new(settings);
    let packager = Arc::new(PlatformPackager::new(settings.clone(), Platform::Linux, session));
    let mut tasks = TaskManager::new();
    let status = packager
        .pack(settings.output_dir(), Arch::X64, targets, &mut tasks)
        .await?;
    tasks.await_tasks().await?;
    Ok((status, packager.compute_app_out_dir(settings.output_dir(), Arch::X64)))
}

#[tokio::test]
async fn copy_mode_applies_rule_order_and_shared_excludes() {
    let project = fixture_project();
    write_config(
        project.path(),
        r#"
        files = ["**/*", "!**/*.map"]
        extra_resources = [{ from = "assets", to = "assets" }]
        extra_metadata = { custom = true }

        [linux]
        archive = false
        "#,
    );
    let settings = settings_builder(project.path()).build().unwrap();

    let (status, app_out_dir) = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap();
    assert_eq!(status, PackStatus::Completed);
    assert_eq!(app_out_dir, project.path().join("dist/linux-unpacked"));

    let resources = app_out_dir.join("resources");
    let app = resources.join("app");
    assert!(app.join("index.js").is_file());
    assert!(app.join("lib/util.js").is_file());
    assert!(!app.join("lib/util.js.map").exists());

    // Claimed by extra_resources, so only placed once
    assert!(!app.join("assets").exists());
    assert!(resources.join("assets/icon.png").is_file());

    assert!(app.join("node_modules/dep/index.js").is_file());
    assert!(!app.join("node_modules/dep/README.md").exists());

    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(app.join("package.json")).unwrap()).unwrap();
    assert_eq!(manifest["custom"], serde_json::json!(true));
    assert_eq!(manifest["name"], "my-app");

    let module: serde_json::Value = serde_json::from_slice(
        &std::fs::read(app.join("node_modules/dep/package.json")).unwrap(),
    )
    .unwrap();
    assert!(module.get("_resolved").is_none());
    assert_eq!(module["name"], "dep");

    // The output directory lives inside the app dir and is never copied
    assert!(!app.join("dist").exists());
}

#[tokio::test]
async fn build_mode_packs_archive_and_unpacks_native_modules() {
    let project = fixture_project();
    let events = Events::default();
    let integrity = Arc::new(Mutex::new(None));
    let framework = RecordingFramework {
        events: events.clone(),
        integrity: integrity.clone(),
        ..Default::default()
    };
    let settings = settings_builder(project.path()).framework(framework).build().unwrap();

    let (status, app_out_dir) = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap();
    assert_eq!(status, PackStatus::Completed);

    let resources = app_out_dir.join("resources");
    let archive = resources.join("app.tar");
    assert!(archive.is_file());
    assert!(!resources.join("app").exists());
    assert!(resources.join("app.tar.unpacked/node_modules/dep/addon.node").is_file());

    let entries = tar_entries(&archive);
    assert!(entries.iter().any(|e| e == "index.js"));
    assert!(entries.iter().any(|e| e == "package.json"));
    assert!(entries.iter().any(|e| e == "node_modules/dep/index.js"));
    assert!(!entries.iter().any(|e| e.ends_with("addon.node")));

    let integrity = integrity.lock().unwrap().clone().expect("integrity in build mode");
    assert_eq!(integrity.algorithm, "SHA256");
    assert_eq!(integrity.size, std::fs::metadata(&archive).unwrap().len());

    assert_eq!(
        snapshot(&events),
        vec!["prepare", "before_copy_extra_files", "framework after_pack"]
    );
}

#[tokio::test]
async fn missing_manifest_fails_the_sanity_check() {
    let project = fixture_project();
    write_config(
        project.path(),
        r#"
        archive = false
        files = ["**/*", "!package.json"]
        "#,
    );
    let settings = settings_builder(project.path()).build().unwrap();

    let err = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap_err();
    match &err {
        Error::SanityCheck { path, message } => {
            assert!(path.ends_with("resources/app/package.json"));
            assert!(message.contains("does not exist. Seems like a wrong configuration."));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn entry_file_absent_from_archive_fails_the_sanity_check() {
    let project = fixture_project();
    write_config(project.path(), r#"files = ["**/*", "!index.js"]"#);
    let settings = settings_builder(project.path()).build().unwrap();

    let err = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SanityCheck { .. }));
    let message = err.to_string();
    assert!(message.starts_with("Application entry file \"index.js\" does not exist in"));
    assert!(message.contains("app.tar"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn extra_files_stage_waits_for_every_copy_task() {
    let project = fixture_project();
    write_config(
        project.path(),
        r#"
        archive = false
        extra_resources = [{ from = "assets", to = "assets" }]
        "#,
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let transformed = Events::default();
    let framework = RecordingFramework {
        slow_node_modules: true,
        transformed: Some(transformed.clone()),
        files_seen_before_extra: seen.clone(),
        ..Default::default()
    };
    let settings = settings_builder(project.path()).framework(framework).build().unwrap();

    pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap();

    // Only module files are slowed down; the extra resource still comes last
    let order = snapshot(&transformed);
    let assets = project.path().join("assets").to_string_lossy().into_owned();
    let first_extra = order
        .iter()
        .position(|f| f.starts_with(&assets))
        .expect("extra resource transformed");
    let last_main = order
        .iter()
        .rposition(|f| !f.starts_with(&assets))
        .expect("application files transformed");
    assert!(order[last_main].contains("node_modules"), "{order:?}");
    assert!(first_extra > last_main, "{order:?}");
    assert!(project.path().join("dist/linux-unpacked/resources/assets/icon.png").is_file());

    let seen = seen.lock().unwrap().clone();
    for expected in [
        "index.js",
        "package.json",
        "lib/util.js",
        "node_modules/dep/index.js",
        "node_modules/dep/package.json",
        "node_modules/dep/addon.node",
    ] {
        assert!(seen.iter().any(|s| s == expected), "{expected} missing in {seen:?}");
    }
}

#[tokio::test]
async fn cancellation_before_packaging_stages_nothing() {
    let project = fixture_project();
    let events = Events::default();
    let framework = RecordingFramework {
        events: events.clone(),
        ..Default::default()
    };
    let settings = settings_builder(project.path()).framework(framework).build().unwrap();
    let session = PackagingSession::new();
    session.cancel();

    let target: Arc<dyn Target> = Arc::new(RecordingTarget {
        name: "never",
        concurrent: true,
        delay: Duration::ZERO,
        events: events.clone(),
    });
    let (status, app_out_dir) = pack_linux(settings, &session, vec![target]).await.unwrap();

    assert_eq!(status, PackStatus::Cancelled);
    assert!(!app_out_dir.exists());
    assert!(snapshot(&events).is_empty());
}

#[tokio::test]
async fn cancellation_during_copy_stops_before_extra_files() {
    let project = fixture_project();
    write_config(
        project.path(),
        r#"
        archive = false
        extra_resources = [{ from = "assets", to = "assets" }]
        "#,
    );
    let session = PackagingSession::new();
    let events = Events::default();
    let framework = RecordingFramework {
        events: events.clone(),
        cancel_on_copy: Some(session.clone()),
        ..Default::default()
    };
    let hook_events = events.clone();
    let settings = settings_builder(project.path())
        .framework(framework)
        .after_pack(Hook::inline(move |_ctx| {
            let events = hook_events.clone();
            async move {
                record(&events, "after_pack hook");
                Ok(())
            }
        }))
        .build()
        .unwrap();

    let (status, app_out_dir) = pack_linux(settings, &session, Vec::new()).await.unwrap();

    assert_eq!(status, PackStatus::Cancelled);
    let resources = app_out_dir.join("resources");
    // The copy batch itself always completes
    assert!(resources.join("app/index.js").is_file());
    assert!(resources.join("app/node_modules/dep/index.js").is_file());
    assert!(!resources.join("assets").exists());
    assert_eq!(snapshot(&events), vec!["prepare"]);
}

#[tokio::test]
async fn hooks_receive_context_and_failures_pass_through_unchanged() {
    let project = fixture_project();
    let events = Events::default();
    let framework = RecordingFramework {
        events: events.clone(),
        ..Default::default()
    };
    let contexts = Arc::new(Mutex::new(Vec::<PackContext>::new()));
    let after_pack_events = events.clone();
    let after_pack_contexts = contexts.clone();
    let settings = settings_builder(project.path())
        .framework(framework)
        .after_pack(Hook::inline(move |ctx| {
            let events = after_pack_events.clone();
            let contexts = after_pack_contexts.clone();
            async move {
                record(&events, "after_pack hook");
                contexts.lock().unwrap().push(ctx);
                Ok(())
            }
        }))
        .after_sign(Hook::inline(|_ctx| async move {
            Err(anyhow::anyhow!("notarization refused"))
        }))
        .build()
        .unwrap();

    let target: Arc<dyn Target> = Arc::new(RecordingTarget {
        name: "mock",
        concurrent: true,
        delay: Duration::ZERO,
        events: events.clone(),
    });
    let err = pack_linux(settings, &PackagingSession::new(), vec![target])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Hook(_)));
    assert_eq!(err.to_string(), "notarization refused");
    assert_eq!(
        snapshot(&events),
        vec!["prepare", "before_copy_extra_files", "after_pack hook", "framework after_pack"]
    );

    let contexts = contexts.lock().unwrap();
    let ctx = &contexts[0];
    assert_eq!(ctx.targets, vec!["mock"]);
    assert_eq!(ctx.platform_name, "linux");
    assert_eq!(ctx.arch, Arch::X64);
    assert_eq!(ctx.product_filename, "My App");
    assert!(ctx.archive_options.is_some());
}

#[tokio::test]
async fn missing_external_hook_is_reported_before_packaging() {
    let project = fixture_project();
    write_config(project.path(), r#"after_pack = "./scripts/missing-hook""#);
    let events = Events::default();
    let framework = RecordingFramework {
        events: events.clone(),
        ..Default::default()
    };
    let settings = settings_builder(project.path()).framework(framework).build().unwrap();

    let err = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(snapshot(&events).is_empty());
}

#[tokio::test]
async fn sequential_targets_run_after_concurrent_ones() {
    let project = fixture_project();
    let settings = settings_builder(project.path()).build().unwrap();
    let events = Events::default();
    let targets: Vec<Arc<dyn Target>> = vec![
        Arc::new(RecordingTarget {
            name: "sequential",
            concurrent: false,
            delay: Duration::ZERO,
            events: events.clone(),
        }),
        Arc::new(RecordingTarget {
            name: "concurrent",
            concurrent: true,
            delay: Duration::from_millis(30),
            events: events.clone(),
        }),
    ];

    pack_linux(settings, &PackagingSession::new(), targets)
        .await
        .unwrap();
    assert_eq!(
        snapshot(&events),
        vec!["start:concurrent", "end:concurrent", "start:sequential", "end:sequential"]
    );
}

#[tokio::test]
async fn legacy_unpack_option_is_a_configuration_error() {
    let project = fixture_project();
    write_config(project.path(), r#""archive-unpack-dir" = "native""#);
    let settings = settings_builder(project.path()).build().unwrap();

    let err = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("archive-unpack-dir is deprecated"));
}

#[tokio::test]
async fn prepackaged_directory_goes_straight_to_targets() {
    let project = fixture_project();
    let prepackaged = project.path().join("prebuilt");
    std::fs::create_dir_all(prepackaged.join("resources")).unwrap();
    std::fs::write(prepackaged.join("resources/app.tar"), "tar").unwrap();

    let settings = settings_builder(project.path())
        .prepackaged(&prepackaged)
        .build()
        .unwrap();
    let out_dir = settings.output_dir().to_path_buf();
    let target = create_target("tar.gz", &out_dir).unwrap();

    let (status, app_out_dir) = pack_linux(settings, &PackagingSession::new(), vec![target])
        .await
        .unwrap();
    assert_eq!(status, PackStatus::Prepackaged);
    assert_eq!(app_out_dir, prepackaged);

    let entries = tar_gz_entries(&out_dir.join("My-App-1.0.0.tar.gz"));
    assert!(entries.iter().any(|e| e == "prebuilt/resources/app.tar"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn packager_runs_every_arch_and_reports_artifacts() {
    let project = fixture_project();
    let artifacts = Arc::new(Mutex::new(Vec::<ArtifactCreated>::new()));
    let listener = artifacts.clone();
    let settings = settings_builder(project.path())
        .on_artifact_created(move |event| listener.lock().unwrap().push(event.clone()))
        .build()
        .unwrap();
    let out_dir = settings.output_dir().to_path_buf();

    let packager = Packager::new(Arc::new(settings), PackagingSession::new());
    let outcomes = packager
        .build(&[Platform::Linux], &[Arch::X64, Arch::Arm64], &["tar.gz".into()])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.status == PackStatus::Completed));
    assert_eq!(outcomes[0].arch, Arch::X64);
    assert!(out_dir.join("linux-unpacked/resources/app.tar").is_file());
    assert!(out_dir.join("linux-arm64-unpacked/resources/app.tar").is_file());

    let x64 = out_dir.join("My-App-1.0.0.tar.gz");
    let arm64 = out_dir.join("My-App-1.0.0-arm64.tar.gz");
    assert!(tar_gz_entries(&x64).iter().any(|e| e == "linux-unpacked/resources/app.tar"));

    let mut created: Vec<_> = artifacts.lock().unwrap().clone();
    created.sort_by(|a, b| a.file.cmp(&b.file));
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].file, arm64);
    assert_eq!(created[1].file, x64);
    assert!(created.iter().all(|a| a.checksum.as_ref().is_some_and(|c| c.len() == 64)));
    assert!(created.iter().all(|a| a.safe_artifact_name.is_none()));
}

#[tokio::test]
async fn packager_failures_keep_the_root_cause() {
    let project = fixture_project();
    write_config(project.path(), r#"files = ["**/*", "!index.js"]"#);
    let settings = settings_builder(project.path()).build().unwrap();

    let packager = Packager::new(Arc::new(settings), PackagingSession::new());
    let err = packager
        .build(&[Platform::Linux], &[Arch::X64], &["dir".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SanityCheck { .. }));

    let err = packager
        .build(&[Platform::Linux], &[Arch::X64, Arch::Arm64], &["dir".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TaskBatch { failed: 2, total: 2, .. }));
    assert!(matches!(err.root(), Error::SanityCheck { .. }));
}

#[tokio::test]
async fn packager_passes_hook_failures_through_unchanged() {
    let project = fixture_project();
    let settings = settings_builder(project.path())
        .after_pack(Hook::inline(|_ctx| async move {
            Err(anyhow::anyhow!("notarization refused"))
        }))
        .build()
        .unwrap();

    let packager = Packager::new(Arc::new(settings), PackagingSession::new());
    let err = packager
        .build(&[Platform::Linux], &[Arch::X64], &["dir".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Hook(_)));
    assert_eq!(err.to_string(), "notarization refused");
}

#[tokio::test]
async fn extra_files_go_through_the_framework_transformer() {
    let project = fixture_project();
    std::fs::create_dir_all(project.path().join("extras")).unwrap();
    std::fs::write(project.path().join("extras/note.txt"), "original").unwrap();
    write_config(
        project.path(),
        r#"
        archive = false
        extra_files = [{ from = "extras", to = "extras" }]
        "#,
    );
    let framework = RecordingFramework {
        rewrite_txt: true,
        ..Default::default()
    };
    let settings = settings_builder(project.path()).framework(framework).build().unwrap();

    let (_, app_out_dir) = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap();

    let content = std::fs::read_to_string(app_out_dir.join("extras/note.txt")).unwrap();
    assert_eq!(content, "TRANSFORMED");
    assert!(!app_out_dir.join("resources/app/extras").exists());
}

#[tokio::test]
async fn modules_claimed_by_extra_resources_are_not_copied_twice() {
    let project = fixture_project();
    write_config(
        project.path(),
        r#"
        archive = false
        extra_resources = [{ from = "node_modules/dep", to = "dep" }]
        "#,
    );
    let settings = settings_builder(project.path()).build().unwrap();

    let (_, app_out_dir) = pack_linux(settings, &PackagingSession::new(), Vec::new())
        .await
        .unwrap();

    let resources = app_out_dir.join("resources");
    assert!(resources.join("dep/index.js").is_file());
    assert!(resources.join("app/index.js").is_file());
    assert!(!resources.join("app/node_modules/dep").exists());
}
