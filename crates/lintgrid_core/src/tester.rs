//! Rule fixtures.
//!
//! A rule `rules/no_latest.wasm` is tested by `rules/no_latest_test.json`, a
//! JSON (or JSONC) array of cases. A case builds the rule's top-level argument
//! from data files next to the fixture and an optional inline `param`, runs the
//! rule, and compares its non-excluded entries with `result`.
//!
//! ```json
//! [
//!   {
//!     "name": "latest tag is reported",
//!     "data_file": "testdata/latest.yaml",
//!     "fake_data_file": "deploy/app.yaml",
//!     "param": {"config": {"allow": []}},
//!     "result": [{"name": "no-latest", "level": "error"}]
//!   }
//! ]
//! ```
//!
//! Only `name`, `links`, `message`, `level`, `location` and `custom` take part
//! in the comparison. Empty strings and nulls count as absent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use jsonc_parser::ParseOptions;
use lintgrid_plugin::RuleEngine;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::LinterError;
use crate::decoder::{Data, Decoder};
use crate::fs::{EntryKind, FileSystem};
use crate::linter::Linter;
use crate::matcher::{IgnoreSet, Pattern, PatternMatcher, to_slash};
use crate::resolver::{ResolvedDataFile, ResolvedLintFile};
use crate::rule::RuleParser;

/// File name suffix of a rule fixture, replacing the rule's extension.
pub const TEST_FILE_SUFFIX: &str = "_test.json";

/// Extension of rule files.
pub const RULE_EXTENSION: &str = "wasm";

const COMPARED_FIELDS: &[&str] = &["name", "links", "message", "level", "location", "custom"];

/// A rule and its fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPair {
    pub lint_file: PathBuf,
    pub test_file: PathBuf,
}

/// `rules/a.wasm` -> `rules/a_test.json`.
pub fn test_file_for(lint_file: &Path) -> PathBuf {
    let stem = lint_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    lint_file.with_file_name(format!("{stem}{TEST_FILE_SUFFIX}"))
}

/// `rules/a_test.json` -> `rules/a.wasm`, or `None` for other names.
pub fn lint_file_for(test_file: &Path) -> Option<PathBuf> {
    let name = test_file.file_name()?.to_str()?;
    let stem = name.strip_suffix(TEST_FILE_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(test_file.with_file_name(format!("{stem}.{RULE_EXTENSION}")))
}

fn is_file(fs: &dyn FileSystem, path: &Path) -> Result<bool, LinterError> {
    Ok(fs
        .kind(path)
        .map_err(|e| LinterError::resolve(path, e))?
        .is_some_and(|kind| !kind.is_dir()))
}

/// Pairs for explicitly given paths. A fixture is paired with its rule, a rule
/// with its fixture if one exists, and a directory with every fixture below it
/// whose rule exists. Other paths are skipped.
pub fn find_pairs(
    fs: &dyn FileSystem,
    ignore: &IgnoreSet,
    paths: &[PathBuf],
) -> Result<Vec<TestPair>, LinterError> {
    let matcher = PatternMatcher::new(fs, ignore);
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    let mut add = |pair: TestPair| {
        if seen.insert(pair.test_file.clone()) {
            pairs.push(pair);
        }
    };

    for path in paths {
        if let Some(lint_file) = lint_file_for(path) {
            add(TestPair {
                lint_file,
                test_file: path.clone(),
            });
            continue;
        }

        if path.extension().is_some_and(|ext| ext == RULE_EXTENSION) {
            let test_file = test_file_for(path);
            if is_file(fs, &test_file)? {
                add(TestPair {
                    lint_file: path.clone(),
                    test_file,
                });
            }
            continue;
        }

        let kind = fs.kind(path).map_err(|e| LinterError::resolve(path, e))?;
        if kind != Some(EntryKind::Dir) {
            debug!(path = %path.display(), "neither a rule, a fixture nor a directory");
            continue;
        }
        let pattern = Pattern::rooted(path, &format!("**/*{TEST_FILE_SUFFIX}"))?;
        for test_file in matcher.glob(&pattern)? {
            let Some(lint_file) = lint_file_for(&test_file) else {
                continue;
            };
            if is_file(fs, &lint_file)? {
                add(TestPair {
                    lint_file,
                    test_file,
                });
            }
        }
    }

    Ok(pairs)
}

/// Pairs for resolved rule files that have a fixture next to them.
pub fn pairs_for_lint_files(
    fs: &dyn FileSystem,
    lint_files: &[ResolvedLintFile],
) -> Result<Vec<TestPair>, LinterError> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for file in lint_files {
        if !seen.insert(file.path.clone()) {
            continue;
        }
        let test_file = test_file_for(&file.path);
        if is_file(fs, &test_file)? {
            pairs.push(TestPair {
                lint_file: file.path.clone(),
                test_file,
            });
        }
    }
    Ok(pairs)
}

/// Data file of a combined case, with an optional path shown to the rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "FixtureDataFileRepr")]
pub struct FixtureDataFile {
    pub path: String,
    pub fake_path: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureDataFileRepr {
    Path(String),
    Detail {
        path: String,
        #[serde(default)]
        fake_path: Option<String>,
    },
}

impl From<FixtureDataFileRepr> for FixtureDataFile {
    fn from(repr: FixtureDataFileRepr) -> Self {
        match repr {
            FixtureDataFileRepr::Path(path) => Self {
                fake_path: path.clone(),
                path,
            },
            FixtureDataFileRepr::Detail { path, fake_path } => Self {
                fake_path: fake_path.unwrap_or_else(|| path.clone()),
                path,
            },
        }
    }
}

/// One case of a fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub name: String,
    /// Decoded into `data`, relative to the fixture.
    pub data_file: Option<String>,
    /// Overrides `data.file_path`.
    pub fake_data_file: Option<String>,
    /// Decoded into `combined_data`, relative to the fixture.
    pub data_files: Vec<FixtureDataFile>,
    /// Top-level argument; data files are merged into it.
    pub param: Map<String, Value>,
    /// Expected entries.
    pub result: Vec<Value>,
}

/// A case whose output differs from its expectation, or that could not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailedCase {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub lint_file: String,
    pub test_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wanted: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub got: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<E: RuleEngine, D: Decoder> Linter<E, D> {
    /// Runs every case of every pair and returns the failures, in pair order.
    pub fn run_tests(&self, pairs: &[TestPair]) -> Vec<FailedCase> {
        let failures: Vec<Vec<FailedCase>> = pairs
            .par_iter()
            .map(|pair| self.run_pair(pair))
            .collect();
        failures.into_iter().flatten().collect()
    }

    fn run_pair(&self, pair: &TestPair) -> Vec<FailedCase> {
        let failure = || FailedCase {
            lint_file: to_slash(&pair.lint_file),
            test_file: to_slash(&pair.test_file),
            ..FailedCase::default()
        };

        let cases = match read_cases(self.fs(), &pair.test_file) {
            Ok(cases) => cases,
            Err(e) => {
                return vec![FailedCase {
                    error: Some(e.to_string()),
                    ..failure()
                }];
            }
        };

        let rule = ResolvedLintFile {
            id: to_slash(&pair.lint_file),
            path: pair.lint_file.clone(),
            config: Map::new(),
            link: None,
        };
        let node = match RuleParser::new(self.engine(), self.fs()).parse(&rule) {
            Ok(node) => node,
            Err(e) => {
                return vec![FailedCase {
                    error: Some(e.to_string()),
                    ..failure()
                }];
            }
        };

        let base_dir = pair.test_file.parent().unwrap_or(Path::new(""));
        cases
            .into_iter()
            .filter_map(|case| {
                let name = case.name.clone();
                let param = match self.build_param(base_dir, case.clone()) {
                    Ok(param) => param,
                    Err(e) => {
                        return Some(FailedCase {
                            name,
                            error: Some(e.to_string()),
                            ..failure()
                        });
                    }
                };

                let outcome = self
                    .engine()
                    .evaluate(&Value::Object(param.clone()).to_string(), &node.program)
                    .map_err(|e| e.to_string())
                    .and_then(|output| compared_entries(&output));
                let failed = match outcome {
                    Ok(got) if got == case.result => return None,
                    Ok(got) => FailedCase {
                        wanted: Some(case.result),
                        got: Some(got),
                        ..failure()
                    },
                    Err(error) => FailedCase {
                        error: Some(error),
                        ..failure()
                    },
                };
                Some(FailedCase {
                    name,
                    param: Some(Value::Object(param)),
                    ..failed
                })
            })
            .collect()
    }

    fn build_param(&self, base_dir: &Path, case: TestCase) -> Result<Map<String, Value>, LinterError> {
        let mut param = case.param;

        if let Some(data_file) = &case.data_file {
            let mut data = self.decode_fixture_data(base_dir, data_file)?;
            let inline_path = param
                .get("data")
                .and_then(|data| data.get("file_path"))
                .and_then(Value::as_str)
                .filter(|path| !path.is_empty());
            if let Some(path) = case.fake_data_file.as_deref().or(inline_path) {
                data.file_path = path.to_string();
            }
            param.insert("data".to_string(), to_value(&data)?);
        }

        if !case.data_files.is_empty() {
            let combined = case
                .data_files
                .iter()
                .map(|file| {
                    let mut data = self.decode_fixture_data(base_dir, &file.path)?;
                    data.file_path = file.fake_path.clone();
                    to_value(&data)
                })
                .collect::<Result<Vec<_>, _>>()?;
            param.insert("combined_data".to_string(), Value::Array(combined));
        }

        param
            .entry("config")
            .or_insert_with(|| Value::Object(Map::new()));
        Ok(param)
    }

    fn decode_fixture_data(&self, base_dir: &Path, path: &str) -> Result<Data, LinterError> {
        let file = ResolvedDataFile::new(path, base_dir.join(path));
        self.decoder().decode(self.fs(), &file)
    }
}

fn to_value(data: &Data) -> Result<Value, LinterError> {
    serde_json::to_value(data).map_err(|e| LinterError::internal(e.to_string()))
}

fn read_cases(fs: &dyn FileSystem, test_file: &Path) -> Result<Vec<TestCase>, LinterError> {
    let invalid = |message: String| LinterError::decode(test_file, message);
    let bytes = fs.read(test_file).map_err(|e| invalid(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
    let value = jsonc_parser::parse_to_serde_value(&text, &ParseOptions::default())
        .map_err(|e| invalid(format!("Invalid JSON: {e}")))?
        .unwrap_or_else(|| Value::Array(Vec::new()));
    serde_json::from_value(value).map_err(|e| invalid(format!("Invalid test cases: {e}")))
}

/// Non-excluded entries of a rule's output, reduced to the compared fields.
fn compared_entries(output: &str) -> Result<Vec<Value>, String> {
    let entries: Vec<Map<String, Value>> = serde_json::from_str(output)
        .map_err(|e| format!("rule output is not a list of results: {e}"))?;

    Ok(entries
        .into_iter()
        .filter(|entry| entry.get("excluded").and_then(Value::as_bool) != Some(true))
        .map(|mut entry| {
            let kept = COMPARED_FIELDS
                .iter()
                .filter_map(|&field| match entry.remove(field) {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) if s.is_empty() => None,
                    Some(value) => Some((field.to_string(), value)),
                })
                .collect();
            Value::Object(kept)
        })
        .collect())
}
