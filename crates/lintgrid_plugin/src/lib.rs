//! # lintgrid_plugin
//!
//! Rule engine abstraction for lintgrid.
//!
//! A rule file is parsed once into an engine-specific program and then
//! evaluated against any number of top-level arguments. The core crate only
//! talks to [`RuleEngine`]; the WebAssembly runtime lives behind the
//! `native` feature.

mod engine;
#[cfg(feature = "native")]
mod engine_extism;
mod error;

pub use engine::RuleEngine;
#[cfg(feature = "native")]
pub use engine_extism::{ExtismEngine, LINT_FUNCTION};
pub use error::EngineError;
