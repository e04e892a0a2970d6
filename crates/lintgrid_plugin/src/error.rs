//! Rule engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while parsing or evaluating a rule program.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The rule program could not be loaded.
    #[error("Failed to parse rule program {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Evaluating the rule program failed.
    #[error("Rule evaluation failed: {0}")]
    Evaluate(String),

    /// The rule returned something that is not JSON.
    #[error("Rule output is not valid JSON: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a parse error for the given rule file.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an evaluation error.
    pub fn evaluate(message: impl Into<String>) -> Self {
        Self::Evaluate(message.into())
    }
}
