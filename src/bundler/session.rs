//! Per-invocation packaging state: cancellation and scratch directories.

use super::{ErrorExt, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// State shared by every pipeline of one packaging run.
///
/// Passed by reference into each [`PlatformPackager`](crate::bundler::PlatformPackager);
/// there is no process-wide state.
#[derive(Debug, Clone)]
pub struct PackagingSession {
    cancellation: CancellationToken,
    temp_dirs: TempDirManager,
    retain_stage_dirs: bool,
}

impl Default for PackagingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PackagingSession {
    /// Creates a session with a fresh token and scratch root.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Creates a session observing an existing token.
    pub fn with_token(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            temp_dirs: TempDirManager::new(std::env::temp_dir()),
            retain_stage_dirs: false,
        }
    }

    /// Keeps stage directories on disk after use.
    pub fn retain_stage_dirs(mut self, retain: bool) -> Self {
        self.retain_stage_dirs = retain;
        self
    }

    /// Places scratch directories below `root` instead of the system temp dir.
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_dirs = TempDirManager::new(root);
        self
    }

    /// The session's cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Requests cancellation. Pipelines stop at their next checkpoint.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Scratch directory allocator.
    pub fn temp_dirs(&self) -> &TempDirManager {
        &self.temp_dirs
    }

    /// Whether stage directories are kept for debugging.
    pub fn retains_stage_dirs(&self) -> bool {
        self.retain_stage_dirs
    }
}

/// Allocates uniquely named scratch paths below a root directory.
#[derive(Debug, Clone)]
pub struct TempDirManager {
    root: PathBuf,
}

impl TempDirManager {
    /// Creates an allocator rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns an unused path `<root>/<prefix>-<uuid><suffix>`. Nothing is created.
    pub fn temp_path(&self, prefix: &str, suffix: &str) -> PathBuf {
        self.root
            .join(format!("{prefix}-{}{suffix}", uuid::Uuid::new_v4().simple()))
    }

    /// Creates a fresh scratch directory.
    pub async fn create_temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        let dir = self.temp_path(prefix, "");
        tokio::fs::create_dir_all(&dir)
            .await
            .fs_context("creating temp directory", &dir)?;
        Ok(dir)
    }
}

/// Scratch directory owned by one stage or target.
///
/// Removed best-effort on drop unless the session retains stage directories.
#[derive(Debug)]
pub struct StageDir {
    dir: PathBuf,
    retain: bool,
}

impl StageDir {
    /// Creates a stage directory for `name`.
    pub async fn new(session: &PackagingSession, name: &str) -> Result<Self> {
        let dir = session.temp_dirs().create_temp_dir(name).await?;
        log::debug!("created stage directory {}", dir.display());
        Ok(Self {
            dir,
            retain: session.retains_stage_dirs(),
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path of `name` inside the stage directory.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for StageDir {
    fn drop(&mut self) {
        if self.retain {
            log::info!("stage directory retained: {}", self.dir.display());
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!("cannot remove stage directory {}: {e}", self.dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let session = PackagingSession::new().temp_root(root.path());
        let stage = StageDir::new(&session, "target").await.unwrap();
        let path = stage.path().to_path_buf();
        assert!(path.is_dir());
        drop(stage);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn retained_stage_dir_survives() {
        let root = tempfile::tempdir().unwrap();
        let session = PackagingSession::new()
            .temp_root(root.path())
            .retain_stage_dirs(true);
        let stage = StageDir::new(&session, "target").await.unwrap();
        let path = stage.path().to_path_buf();
        drop(stage);
        assert!(path.is_dir());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let session = PackagingSession::new();
        let clone = session.clone();
        clone.cancel();
        assert!(session.is_cancelled());
    }
}
