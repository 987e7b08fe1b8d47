//! Application packaging pipeline library
//!
//! This library turns a built application tree into platform specific
//! artifacts:
//! - Unpacked application directories (`linux-unpacked`, `win-arm64-unpacked`, ...)
//! - Compressed archives (`.tar.gz`)
//! - Any installer format plugged in through [`bundler::Target`]
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
