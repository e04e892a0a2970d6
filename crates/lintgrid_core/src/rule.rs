//! Rule parsing.

use std::path::Path;

use lintgrid_plugin::{EngineError, RuleEngine};
use serde::Serialize;

use crate::LinterError;
use crate::config::RuleConfig;
use crate::fs::FileSystem;
use crate::resolver::ResolvedLintFile;

/// How a rule consumes a target's data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One evaluation per data file.
    PerFile,
    /// One evaluation over all data files of the target.
    Combined,
}

impl ExecutionMode {
    pub const COMBINE_SUFFIX: &'static str = "_combine";

    /// `foo_combine.wasm` is combined, everything else is per file.
    pub fn from_path(path: &Path) -> Self {
        let combined = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(Self::COMBINE_SUFFIX));
        if combined {
            Self::Combined
        } else {
            Self::PerFile
        }
    }
}

/// A parsed rule, ready for evaluation.
#[derive(Debug)]
pub struct Node<P> {
    pub program: P,
    /// Lint file id, used to label results.
    pub key: String,
    pub config: RuleConfig,
    pub mode: ExecutionMode,
    pub link: Option<String>,
}

/// Reads rule files and parses them with a [`RuleEngine`].
pub struct RuleParser<'a, E: RuleEngine> {
    engine: &'a E,
    fs: &'a dyn FileSystem,
}

impl<'a, E: RuleEngine> RuleParser<'a, E> {
    pub fn new(engine: &'a E, fs: &'a dyn FileSystem) -> Self {
        Self { engine, fs }
    }

    pub fn parse(&self, file: &ResolvedLintFile) -> Result<Node<E::Program>, LinterError> {
        let source = self
            .fs
            .read(&file.path)
            .map_err(|e| LinterError::parse(&file.path, e.to_string()))?;

        let program = self
            .engine
            .parse(&file.path, &source)
            .map_err(|e| match e {
                EngineError::Parse { message, .. } => LinterError::parse(&file.path, message),
                other => LinterError::parse(&file.path, other.to_string()),
            })?;

        Ok(Node {
            program,
            key: file.id.clone(),
            config: file.config.clone(),
            mode: ExecutionMode::from_path(&file.path),
            link: file.link.clone(),
        })
    }

    /// Parses every file; the first failure aborts.
    pub fn parse_all(
        &self,
        files: &[ResolvedLintFile],
    ) -> Result<Vec<Node<E::Program>>, LinterError> {
        files.iter().map(|file| self.parse(file)).collect()
    }
}
