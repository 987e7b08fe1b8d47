//! Error types for the command line tool.
//!
//! Pipeline failures are carried as [`crate::bundler::Error`]; this module
//! adds argument errors and recovery hints for the terminal.

use crate::bundler::Error as PackError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Main error type of the command line tool
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Packaging errors
    #[error("Packaging error: {0}")]
    Bundler(#[from] PackError),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Conflicting arguments
    #[error("Conflicting arguments: {arguments:?}")]
    ConflictingArguments {
        /// Arguments that conflict
        arguments: Vec<String>,
    },
}

impl BundlerError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        let BundlerError::Bundler(error) = self else {
            return vec!["Run with --help to see the accepted arguments".to_string()];
        };

        match error.root() {
            PackError::Configuration(_) => vec![
                "Check package.json and kodegen-package.toml in the project directory".to_string(),
            ],
            PackError::SanityCheck { .. } => vec![
                "Make sure `files` does not exclude the entry file or package.json".to_string(),
                "Set `main` in package.json if the entry file is not index.js".to_string(),
            ],
            PackError::Hook(_) => vec!["Inspect the output of the failing hook above".to_string()],
            _ => vec!["Run with RUST_LOG=debug for details".to_string()],
        }
    }
}
