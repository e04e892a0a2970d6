//! Linter error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run (or the resolution of a target).
///
/// Failures of a single (rule, data file) pair are not represented here; they
/// are recorded on the pair's [`LintResult`](crate::LintResult) instead.
#[derive(Debug, Error)]
pub enum LinterError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Walking the file system failed.
    #[error("Failed to resolve files under {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rule file could not be read or parsed.
    #[error("Failed to parse rule {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A data file could not be decoded.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Module reference error.
    #[error("Module error: {0}")]
    Module(#[from] lintgrid_registry::ArchiveError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LinterError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a resolution error for a walk rooted at `path`.
    pub fn resolve(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resolve {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
