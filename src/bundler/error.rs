//! Error types for the packaging pipeline.
//!
//! Every stage of the pipeline reports failures through [`Error`]. Hook
//! failures are carried verbatim in [`Error::Hook`] so the caller observes
//! exactly what the hook raised.

use std::{fmt::Display, path::PathBuf};
use thiserror::Error as DeriveError;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the packager.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or unsupported configuration.
    ///
    /// Raised for missing metadata fields, unresolved macro tokens,
    /// deprecated options, unresolved hooks and resources that could not
    /// be found in any search location.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The packaged tree does not contain what it must contain.
    #[error("{message}")]
    SanityCheck {
        /// Path that was expected to exist
        path: PathBuf,
        /// Human readable description
        message: String,
    },

    /// Failure raised by a user or framework hook, propagated unchanged.
    #[error(transparent)]
    Hook(anyhow::Error),

    /// First failure of a joined task batch.
    #[error("{failed} of {total} tasks failed: {first}")]
    TaskBatch {
        /// Number of failed tasks in the batch
        failed: usize,
        /// Number of tasks in the batch
        total: usize,
        /// The first failure, in registration order
        #[source]
        first: Box<Error>,
    },

    /// A content transformer failed for one file.
    #[error("failed to transform {path}: {source}")]
    Transform {
        /// Source file the transformer was applied to
        path: PathBuf,
        /// Transformer failure
        #[source]
        source: anyhow::Error,
    },

    /// Filesystem operation failed with path context.
    #[error("{context} {path}: {error}")]
    Fs {
        /// What was being done
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        error: std::io::Error,
    },

    /// Plain IO error.
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid glob pattern.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Directory walk error.
    #[error("{0}")]
    Walk(#[from] walkdir::Error),

    /// Path prefix error.
    #[error("{0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// Generic error.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Returns true for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Follows [`Error::TaskBatch`] down to the failure that started it.
    pub fn root(&self) -> &Error {
        match self {
            Error::TaskBatch { first, .. } => first.root(),
            other => other,
        }
    }

    /// Strips [`Error::TaskBatch`] layers that carry a single failure.
    pub fn into_single_failure(self) -> Error {
        match self {
            Error::TaskBatch { failed: 1, first, .. } => first.into_single_failure(),
            other => other,
        }
    }
}

/// Convenient early return with [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

/// Attaches a context message to an `Option` or `Result`.
pub trait Context<T> {
    /// Turns `None`/`Err` into [`Error::GenericError`] with the given message.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Lazily evaluated variant of [`Context::context`].
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

impl<T, E: Display> Context<T> for std::result::Result<T, E> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

/// Adds path context to IO results.
pub trait ErrorExt<T> {
    /// Maps an IO error to [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}
