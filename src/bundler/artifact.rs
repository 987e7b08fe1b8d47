//! Artifact-created events.

use super::Arch;
use std::{fmt, path::PathBuf, sync::Arc};

/// A distributable file was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCreated {
    /// Artifact path
    pub file: PathBuf,
    /// Release-hosting safe file name when `file`'s name is not safe
    pub safe_artifact_name: Option<String>,
    /// Target that produced the file
    pub target: Option<String>,
    /// Architecture
    pub arch: Option<Arch>,
    /// Hex encoded SHA-256 of the file
    pub checksum: Option<String>,
}

impl fmt::Display for ArtifactCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(target) = &self.target {
            write!(f, " ({target}")?;
            if let Some(arch) = self.arch {
                write!(f, ", {arch}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Receives [`ArtifactCreated`] events. Called from target tasks.
pub type ArtifactListener = Arc<dyn Fn(&ArtifactCreated) + Send + Sync>;
