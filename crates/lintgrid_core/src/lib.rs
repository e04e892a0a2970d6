//! # lintgrid_core
//!
//! Core engine of lintgrid.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - Ordered include/exclude resolution of rule, module and data files
//! - Data file decoding
//! - The `Linter` orchestrator (per-file and combined rules)
//! - Result flattening and severity filtering
//! - Rule fixtures (`<rule>_test.json`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use lintgrid_core::{Config, FileResolver, Linter, OsFs, Thresholds};
//!
//! let config = Config::from_file("lintgrid.json")?;
//! let ignore = config.ignore_set()?;
//! let resolver = FileResolver::new(&OsFs, &ignore, &cache, &config.base_dir);
//! let targets = resolver.resolve(&config.targets)?;
//!
//! let linter = Linter::new(ExtismEngine::new(), Box::new(OsFs));
//! let results = linter.lint(&targets)?;
//! let report = Thresholds::new(config.error_level, config.shown_error_level).apply(&results);
//! ```

pub mod config;
pub mod decoder;
mod error;
pub mod filter;
pub mod fs;
mod level;
mod linter;
pub mod matcher;
pub mod report;
pub mod resolver;
pub mod result;
pub mod rule;
pub mod tester;

#[cfg(test)]
pub mod test_utils;

pub use config::{Config, OutputConfig, Renderer, RuleConfig, Target};
pub use decoder::{Data, Decoder, FileDecoder, FileType};
pub use error::LinterError;
pub use fs::{EntryKind, FileSystem, MemoryFs, OsFs};
pub use level::ErrorLevel;
pub use linter::{Linter, TopLevelArgument};
pub use matcher::{IgnoreSet, Pattern, PatternMatcher};
pub use report::{Report, Thresholds};
pub use resolver::{FileResolver, ResolvedDataFile, ResolvedLintFile, ResolvedTarget};
pub use result::{Finding, Link, LintResult, RawRuleResult};
pub use rule::{ExecutionMode, Node, RuleParser};
pub use tester::{FailedCase, TestPair};

#[cfg(feature = "native")]
pub use lintgrid_plugin::ExtismEngine;
