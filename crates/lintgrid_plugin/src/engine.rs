//! Rule engine abstraction.
//!
//! The orchestrator never interprets rule programs itself. It hands a
//! serialized top-level argument to an engine and receives the rule's JSON
//! output back, so alternative runtimes (or test doubles) only need to
//! implement [`RuleEngine`].

use std::path::Path;

use crate::EngineError;

/// Parses and evaluates rule programs.
pub trait RuleEngine: Send + Sync {
    /// Parsed, ready-to-run form of a rule file.
    type Program: Send + Sync;

    /// Parses the raw contents of a rule file.
    ///
    /// `path` is only used for error reporting.
    fn parse(&self, path: &Path, source: &[u8]) -> Result<Self::Program, EngineError>;

    /// Evaluates a program against a JSON-encoded top-level argument.
    ///
    /// On success the returned string must be valid JSON.
    fn evaluate(&self, tla_json: &str, program: &Self::Program) -> Result<String, EngineError>;
}
