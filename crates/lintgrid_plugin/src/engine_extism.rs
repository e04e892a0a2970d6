//! Extism-based WebAssembly rule engine.
//!
//! A rule is a WASM module exporting [`LINT_FUNCTION`]. The function receives
//! the top-level argument as a JSON string and returns the rule output as a
//! JSON string.

use std::path::Path;

use extism::{Manifest, Plugin, Wasm};
use extism_manifest::MemoryOptions;
use parking_lot::Mutex;
use tracing::debug;

use crate::{EngineError, RuleEngine};

/// Name of the function every rule module must export.
pub const LINT_FUNCTION: &str = "lint";

/// Default memory limit for rule instances (128 MB = 2048 pages).
/// Each WASM page is 64KB.
const DEFAULT_MEMORY_MAX_PAGES: u32 = 2048;

/// Default timeout for a single evaluation (5000 ms).
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Rule engine backed by Extism (wasmtime).
#[derive(Debug, Clone)]
pub struct ExtismEngine {
    timeout_ms: u64,
    memory_max_pages: u32,
}

impl ExtismEngine {
    /// Creates an engine with the default limits.
    pub fn new() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            memory_max_pages: DEFAULT_MEMORY_MAX_PAGES,
        }
    }

    /// Overrides the per-call timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Overrides the memory limit, in 64KB pages.
    pub fn with_memory_max_pages(mut self, pages: u32) -> Self {
        self.memory_max_pages = pages;
        self
    }

    fn configure_manifest(&self, mut manifest: Manifest) -> Manifest {
        manifest.timeout_ms = Some(self.timeout_ms);
        manifest.memory = MemoryOptions {
            max_pages: Some(self.memory_max_pages),
            max_http_response_bytes: None,
            max_var_bytes: None,
        };
        manifest
    }
}

impl Default for ExtismEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine for ExtismEngine {
    // Extism plugins need `&mut` to be called.
    type Program = Mutex<Plugin>;

    fn parse(&self, path: &Path, source: &[u8]) -> Result<Self::Program, EngineError> {
        debug!(path = %path.display(), bytes = source.len(), "loading rule module");

        let manifest = self.configure_manifest(Manifest::new([Wasm::data(source.to_vec())]));
        let plugin = Plugin::new(&manifest, [], true)
            .map_err(|e| EngineError::parse(path, e.to_string()))?;

        if !plugin.function_exists(LINT_FUNCTION) {
            return Err(EngineError::parse(
                path,
                format!("module does not export `{LINT_FUNCTION}`"),
            ));
        }

        Ok(Mutex::new(plugin))
    }

    fn evaluate(&self, tla_json: &str, program: &Self::Program) -> Result<String, EngineError> {
        let output: String = program
            .lock()
            .call(LINT_FUNCTION, tla_json)
            .map_err(|e| EngineError::evaluate(e.to_string()))?;

        serde_json::from_str::<serde_json::Value>(&output)?;
        Ok(output)
    }
}
