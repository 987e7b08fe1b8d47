//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, with validation
//! of the platform, architecture and target lists.

use crate::bundler::{Arch, Platform};
use clap::Parser;
use std::path::PathBuf;

/// Application packaging pipeline
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_package",
    version,
    about = "Packages an application directory into platform specific artifacts",
    long_about = "Packages an application directory into platform specific artifacts.

Reads package.json (and kodegen-package.toml when present) from the project
directory, runs one pipeline per platform and architecture, and writes the
unpacked application directories and artifacts into the output directory.

Usage:
  kodegen_bundler_package .
  kodegen_bundler_package my-app --platform linux --platform win --arch x64 --arch arm64
  kodegen_bundler_package my-app --target dir --shell-dir ./runtime"
)]
pub struct Args {
    /// Project directory containing package.json
    #[arg(value_name = "PROJECT", default_value = ".")]
    pub project: PathBuf,

    /// Platforms to package for: mac, linux, win (default: current)
    #[arg(short, long = "platform", value_name = "PLATFORM")]
    pub platforms: Vec<Platform>,

    /// Architectures to package for: x64, ia32, armv7l, arm64, universal (default: host)
    #[arg(short, long = "arch", value_name = "ARCH")]
    pub archs: Vec<Arch>,

    /// Distributable targets: dir, tar.gz (default: platform configuration)
    #[arg(short, long = "target", value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Output directory (default: directories.output, then dist)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Runtime shell directory copied into every unpacked application
    #[arg(long, value_name = "DIR")]
    pub shell_dir: Option<PathBuf>,

    /// Already packaged application directory; only targets are built
    #[arg(long, value_name = "DIR")]
    pub prepackaged: Option<PathBuf>,

    /// Keep stage directories for debugging
    #[arg(long, env = "KODEGEN_KEEP_STAGE_DIRS")]
    pub keep_stage_dirs: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        const KNOWN_TARGETS: [&str; 3] = ["dir", "tar.gz", "tgz"];
        if let Some(target) = self
            .targets
            .iter()
            .find(|t| !KNOWN_TARGETS.contains(&t.as_str()))
        {
            return Err(format!(
                "Invalid target: {}. Valid targets: {}",
                target,
                KNOWN_TARGETS.join(", ")
            ));
        }

        if self.prepackaged.is_some() && (self.platforms.len() > 1 || self.archs.len() > 1) {
            return Err("--prepackaged accepts a single platform and architecture".to_string());
        }

        Ok(())
    }

    /// Platforms to package, the current one when none was given.
    pub fn platforms(&self) -> Vec<Platform> {
        if self.platforms.is_empty() {
            vec![Platform::current()]
        } else {
            dedup(&self.platforms)
        }
    }

    /// Architectures to package, the host one when none was given.
    pub fn archs(&self) -> Vec<Arch> {
        if self.archs.is_empty() {
            vec![Arch::host()]
        } else {
            dedup(&self.archs)
        }
    }
}

fn dedup<T: PartialEq + Copy>(items: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(*item);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_platforms_and_archs() {
        let args = Args::try_parse_from([
            "kodegen_bundler_package",
            "app",
            "--platform",
            "linux",
            "-p",
            "win",
            "--arch",
            "arm64",
            "--arch",
            "arm64",
        ])
        .unwrap();
        assert_eq!(args.project, PathBuf::from("app"));
        assert_eq!(args.platforms(), vec![Platform::Linux, Platform::Windows]);
        assert_eq!(args.archs(), vec![Arch::Arm64]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_targets() {
        let args =
            Args::try_parse_from(["kodegen_bundler_package", "--target", "msi"]).unwrap();
        assert!(args.validate().unwrap_err().contains("msi"));
    }

    #[test]
    fn prepackaged_needs_a_single_pipeline() {
        let args = Args::try_parse_from([
            "kodegen_bundler_package",
            "--prepackaged",
            "out",
            "--arch",
            "x64",
            "--arch",
            "arm64",
        ])
        .unwrap();
        assert!(args.validate().is_err());
    }
}
