//! Pipeline orchestration.
//!
//! # Module Organization
//!
//! - [`checksum`] - SHA-256 of artifacts and directories
//! - [`orchestrator`] - [`PlatformPackager`], the per-platform pipeline
//! - [`packager`] - [`Packager`], running pipelines for several platforms and architectures
//! - [`signing`] - Certificate resolution and `force_code_signing`

mod checksum;
mod orchestrator;
mod packager;
mod signing;

pub use checksum::calculate_sha256;
pub use orchestrator::{APP_DIR_NAME, PackStatus, PackagingMode, PlatformPackager};
pub use packager::{Packager, PipelineOutcome};
pub use signing::SigningConfig;
