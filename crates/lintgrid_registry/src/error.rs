//! Error types for module references.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing module references or mapping them onto the cache.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The module line is malformed.
    #[error("Invalid module `{line}`: {reason}")]
    InvalidLine { line: String, reason: String },

    /// A matched file does not live under the module cache.
    #[error("{path} is not inside the module cache {root}")]
    OutsideCache { path: PathBuf, root: PathBuf },

    /// The module cache directory could not be determined.
    #[error("Cache directory resolution failed")]
    DirResolutionFailed,
}

impl ArchiveError {
    pub(crate) fn invalid(line: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
