//! User extensibility hooks (`after_pack`, `after_sign`).
//!
//! A hook is either an in-process async callback or a reference to an
//! external executable. References are resolved once when a pipeline starts
//! so a missing executable fails before any file is copied.

use super::{ArchiveOptions, Arch, Error, Result, platform::Platform};
use serde::Serialize;
use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    process::Stdio,
    sync::Arc,
};
use tokio::io::AsyncWriteExt;

/// Context handed unchanged to every hook of one pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackContext {
    /// Output directory of the run
    pub out_dir: PathBuf,
    /// Unpacked application directory of this pipeline
    pub app_out_dir: PathBuf,
    /// Architecture
    pub arch: Arch,
    /// Names of the distributable targets
    pub targets: Vec<String>,
    /// Platform
    pub platform: Platform,
    /// Runtime platform name (`darwin`, `linux`, `win32`)
    pub platform_name: String,
    /// Product file name
    pub product_filename: String,
    /// Application version
    pub version: String,
    /// Archive options, `None` when files are copied plainly
    #[serde(skip)]
    pub archive_options: Option<ArchiveOptions>,
}

/// Future returned by inline hooks.
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// In-process hook callback.
pub type HookFn = Arc<dyn Fn(PackContext) -> HookFuture + Send + Sync>;

/// A configured hook.
#[derive(Clone)]
pub enum Hook {
    /// Callback running in-process
    Inline(HookFn),
    /// Executable invoked with `export` as its only argument and the JSON
    /// encoded [`PackContext`] on stdin
    External {
        /// Path relative to the project dir, absolute path or bare program name
        path: String,
        /// Entry point name passed to the program
        export: String,
    },
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Inline(_) => f.write_str("Hook::Inline"),
            Hook::External { path, export } => f
                .debug_struct("Hook::External")
                .field("path", path)
                .field("export", export)
                .finish(),
        }
    }
}

impl Hook {
    /// Wraps an async closure.
    ///
    /// # Examples
    ///
    /// ```
    /// use kodegen_bundler_package::bundler::Hook;
    ///
    /// let hook = Hook::inline(|ctx| async move {
    ///     println!("packed into {}", ctx.app_out_dir.display());
    ///     Ok(())
    /// });
    /// # let _ = hook;
    /// ```
    pub fn inline<F, Fut>(f: F) -> Self
    where
        F: Fn(PackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Hook::Inline(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// References an external program.
    pub fn external(path: impl Into<String>, export: impl Into<String>) -> Self {
        Hook::External {
            path: path.into(),
            export: export.into(),
        }
    }

    /// Resolves external references against `project_dir` and `PATH`.
    pub fn resolve(&self, project_dir: &Path) -> Result<ResolvedHook> {
        match self {
            Hook::Inline(f) => Ok(ResolvedHook::Inline(f.clone())),
            Hook::External { path, export } => Ok(ResolvedHook::External {
                program: resolve_program(path, project_dir)?,
                export: export.clone(),
                working_dir: project_dir.to_path_buf(),
            }),
        }
    }
}

fn resolve_program(path: &str, project_dir: &Path) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let is_path = candidate.is_absolute() || path.starts_with('.') || path.contains(['/', '\\']);

    if is_path {
        let resolved = project_dir.join(candidate);
        if resolved.is_file() {
            return Ok(resolved);
        }
        return Err(Error::Configuration(format!(
            "cannot find hook \"{path}\" (resolved to {})",
            resolved.display()
        )));
    }

    which::which(path)
        .map_err(|e| Error::Configuration(format!("cannot find hook \"{path}\" in PATH: {e}")))
}

/// A hook ready to run.
#[derive(Clone)]
pub enum ResolvedHook {
    /// In-process callback
    Inline(HookFn),
    /// External program
    External {
        /// Absolute program path
        program: PathBuf,
        /// Entry point name
        export: String,
        /// Working directory of the process
        working_dir: PathBuf,
    },
}

impl fmt::Debug for ResolvedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedHook::Inline(_) => f.write_str("ResolvedHook::Inline"),
            ResolvedHook::External { program, export, .. } => f
                .debug_struct("ResolvedHook::External")
                .field("program", program)
                .field("export", export)
                .finish(),
        }
    }
}

impl ResolvedHook {
    /// Runs the hook. Failures come back as [`Error::Hook`] with the hook's
    /// own error inside.
    pub async fn run(&self, ctx: &PackContext) -> Result<()> {
        match self {
            ResolvedHook::Inline(f) => f(ctx.clone()).await.map_err(Error::Hook),
            ResolvedHook::External {
                program,
                export,
                working_dir,
            } => run_external(program, export, working_dir, ctx).await.map_err(Error::Hook),
        }
    }
}

async fn run_external(program: &Path, export: &str, working_dir: &Path, ctx: &PackContext) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(ctx)?;
    log::debug!("running {export} hook {}", program.display());

    let mut child = tokio::process::Command::new(program)
        .arg(export)
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow::anyhow!("cannot start {export} hook {}: {e}", program.display()))?;

    if let Some(mut stdin) = child.stdin.take() {
        // The program may exit without reading its input
        if let Err(e) = stdin.write_all(&payload).await
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        anyhow::bail!(
            "{export} hook {} failed with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PackContext {
        PackContext {
            out_dir: "/out".into(),
            app_out_dir: "/out/linux-unpacked".into(),
            arch: Arch::X64,
            targets: vec!["dir".into()],
            platform: Platform::Linux,
            platform_name: "linux".into(),
            product_filename: "Foo".into(),
            version: "1.0.0".into(),
            archive_options: None,
        }
    }

    #[tokio::test]
    async fn inline_failure_is_passed_through() {
        let hook = Hook::inline(|_| async { anyhow::bail!("notarization refused") });
        let resolved = hook.resolve(Path::new("/")).unwrap();
        let err = resolved.run(&context()).await.unwrap_err();
        assert!(matches!(err, Error::Hook(_)));
        assert_eq!(err.to_string(), "notarization refused");
    }

    #[test]
    fn missing_external_hook_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Hook::external("./hooks/missing.sh", "afterPack")
            .resolve(dir.path())
            .unwrap_err();
        assert!(err.is_configuration());

        let err = Hook::external("kodegen-no-such-program", "afterPack")
            .resolve(dir.path())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_hook_receives_export_and_context() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hook.sh");
        std::fs::write(&script, "#!/bin/sh\necho \"$1\" > called.txt\ncat > context.json\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolved = Hook::external("./hook.sh", "afterPack").resolve(dir.path()).unwrap();
        resolved.run(&context()).await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("called.txt")).unwrap().trim(), "afterPack");
        let ctx: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("context.json")).unwrap()).unwrap();
        assert_eq!(ctx["platformName"], "linux");
        assert_eq!(ctx["arch"], "x64");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_hook_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "#!/bin/sh\necho broken >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolved = Hook::external("fail.sh", "afterSign").resolve(dir.path());
        // bare names go through PATH
        assert!(resolved.is_err());

        let resolved = Hook::external("./fail.sh", "afterSign").resolve(dir.path()).unwrap();
        let err = resolved.run(&context()).await.unwrap_err();
        assert!(matches!(err, Error::Hook(_)));
        assert!(err.to_string().contains("broken"));
    }
}
