//! Platform identities, platform-specific hooks and distributable targets.

mod targets;

pub use targets::{DirTarget, TarGzTarget, create_target};

use super::{Arch, PackContext, PlatformPackager, Result, transformer::FileTransformer};
use async_trait::async_trait;
use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

/// Operating system a pipeline packages for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// macOS
    Mac,
    /// Linux
    Linux,
    /// Windows
    Windows,
}

impl Platform {
    /// All platforms.
    pub const ALL: [Platform; 3] = [Platform::Mac, Platform::Linux, Platform::Windows];

    /// Configuration section key (`mac`, `linux`, `win`), also used for
    /// output directory names and the `${os}` macro.
    pub fn build_configuration_key(self) -> &'static str {
        match self {
            Platform::Mac => "mac",
            Platform::Linux => "linux",
            Platform::Windows => "win",
        }
    }

    /// Runtime platform name (`darwin`, `linux`, `win32`).
    pub fn node_name(self) -> &'static str {
        match self {
            Platform::Mac => "darwin",
            Platform::Linux => "linux",
            Platform::Windows => "win32",
        }
    }

    /// Platform of the running host.
    pub fn current() -> Platform {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// Targets built when neither configuration nor caller names any.
    pub fn default_targets(self) -> &'static [&'static str] {
        &["tar.gz"]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.build_configuration_key())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mac" | "macos" | "darwin" | "osx" => Ok(Platform::Mac),
            "linux" => Ok(Platform::Linux),
            "win" | "windows" | "win32" => Ok(Platform::Windows),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Platform-specific behavior plugged into the pipeline.
#[async_trait]
pub trait PlatformHooks: Send + Sync + fmt::Debug {
    /// Transformer applied to extra files and, in plain copy mode, to
    /// application files before the main transformer.
    fn create_transformer_for_extra_files(&self, _ctx: &PackContext) -> Option<FileTransformer> {
        None
    }

    /// Signs the packaged application.
    async fn sign_app(&self, _ctx: &PackContext, _is_archive: bool) -> Result<()> {
        Ok(())
    }
}

/// [`PlatformHooks`] doing nothing.
#[derive(Debug, Clone, Default)]
pub struct DefaultPlatformHooks;

impl PlatformHooks for DefaultPlatformHooks {}

/// Options a target can override.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct TargetOptions {
    /// Artifact name pattern
    pub artifact_name: Option<String>,
}

/// A distributable format built from the unpacked application directory.
#[async_trait]
pub trait Target: Send + Sync + fmt::Debug {
    /// Target name (`dir`, `tar.gz`).
    fn name(&self) -> &str;

    /// Whether the target may run concurrently with other targets.
    fn is_async_supported(&self) -> bool {
        true
    }

    /// Target-specific options.
    fn options(&self) -> Option<&TargetOptions> {
        None
    }

    /// Builds the artifact.
    async fn build(&self, packager: Arc<PlatformPackager>, app_out_dir: PathBuf, arch: Arch) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_platform_aliases() {
        assert_eq!("darwin".parse::<Platform>().unwrap(), Platform::Mac);
        assert_eq!("win32".parse::<Platform>().unwrap(), Platform::Windows);
        assert!("beos".parse::<Platform>().is_err());
    }

    #[test]
    fn names_follow_runtime_conventions() {
        assert_eq!(Platform::Windows.build_configuration_key(), "win");
        assert_eq!(Platform::Windows.node_name(), "win32");
        assert_eq!(Platform::Mac.to_string(), "mac");
    }
}
