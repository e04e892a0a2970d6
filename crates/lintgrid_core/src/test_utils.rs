//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use lintgrid_plugin::{EngineError, RuleEngine};
use parking_lot::Mutex;
use serde_json::Value;

type Responder = Box<dyn Fn(&Value) -> Result<String, String> + Send + Sync>;

/// A [`RuleEngine`] whose programs are plain text keys mapped to scripted
/// responses. Programs without a script return `[]`.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: HashMap<String, Responder>,
    broken: HashSet<String>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answers `program` with `output`.
    pub fn output(self, program: &str, output: Value) -> Self {
        let output = output.to_string();
        self.respond(program, move |_| Ok(output.clone()))
    }

    /// Fails every evaluation of `program`.
    pub fn fail(self, program: &str, message: &str) -> Self {
        let message = message.to_string();
        self.respond(program, move |_| Err(message.clone()))
    }

    /// Answers `program` with raw text, which need not be JSON.
    pub fn raw(self, program: &str, output: &str) -> Self {
        let output = output.to_string();
        self.respond(program, move |_| Ok(output.clone()))
    }

    pub fn respond<F>(mut self, program: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        self.scripts.insert(program.to_string(), Box::new(f));
        self
    }

    /// Makes parsing of `program` fail.
    pub fn fail_parse(mut self, program: &str) -> Self {
        self.broken.insert(program.to_string());
        self
    }

    /// Top-level arguments `program` was evaluated with, in call order.
    pub fn calls(&self, program: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| p == program)
            .map(|(_, tla)| tla.clone())
            .collect()
    }
}

impl RuleEngine for ScriptedEngine {
    type Program = String;

    fn parse(&self, path: &Path, source: &[u8]) -> Result<String, EngineError> {
        let program = String::from_utf8_lossy(source).into_owned();
        if self.broken.contains(&program) {
            return Err(EngineError::parse(path, "invalid program"));
        }
        Ok(program)
    }

    fn evaluate(&self, tla_json: &str, program: &String) -> Result<String, EngineError> {
        let tla: Value = serde_json::from_str(tla_json)?;
        let response = match self.scripts.get(program) {
            Some(respond) => respond(&tla).map_err(EngineError::evaluate),
            None => Ok("[]".to_string()),
        };
        self.calls.lock().push((program.clone(), tla));
        response
    }
}
