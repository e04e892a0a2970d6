//! Configuration loading.
//!
//! Configuration is a JSON (or JSONC) document validated against the embedded
//! schema. Relative patterns are rooted at the directory containing the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use jsonc_parser::ParseOptions;
use jsonschema::Validator;
use lintgrid_registry::archive::{clean_in_repo_path, strip_negation};
use lintgrid_registry::{ModuleArchive, ModuleLine};
use serde::{Deserialize, Serialize};

use crate::LinterError;
use crate::level::ErrorLevel;
use crate::matcher::{DEFAULT_IGNORED_DIRS, IgnoreSet};

const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

/// Arbitrary key/value map forwarded to a rule at evaluation time.
pub type RuleConfig = serde_json::Map<String, serde_json::Value>;

/// Configuration file as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub error_level: Option<String>,
    pub shown_error_level: Option<String>,
    pub ignored_dirs: Option<Vec<String>>,
    pub targets: Vec<RawTarget>,
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTarget {
    pub id: Option<String>,
    pub lint_files: Vec<RawGlob>,
    pub modules: Vec<RawModule>,
    pub data_files: Vec<String>,
    pub base_data_path: Option<String>,
}

/// A lint-file entry: a bare pattern or a pattern with config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawGlob {
    Path(String),
    Detail {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<RuleConfig>,
    },
}

/// A module entry: a bare module line or a line with config and sub-globs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawModule {
    Line(String),
    Detail {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<RuleConfig>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<RawGlob>,
    },
}

/// How an output collaborator renders results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub id: String,
    #[serde(default)]
    pub renderer: Renderer,
    #[serde(default)]
    pub config: RuleConfig,
}

/// Rule-file pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct LintGlob {
    pub pattern: String,
    pub excluded: bool,
    pub config: Option<RuleConfig>,
}

/// Module pattern, optionally narrowed by ordered sub-globs inside the module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleGlob {
    pub line: ModuleLine,
    pub config: Option<RuleConfig>,
    pub files: Vec<LintGlob>,
}

impl ModuleGlob {
    pub fn excluded(&self) -> bool {
        self.line.excluded
    }
}

/// Data-file pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataGlob {
    pub pattern: String,
    pub excluded: bool,
}

impl DataGlob {
    pub fn parse(pattern: &str) -> Self {
        let (pattern, excluded) = strip_negation(pattern);
        Self {
            pattern: pattern.to_string(),
            excluded,
        }
    }
}

/// One named lint unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    pub lint_files: Vec<LintGlob>,
    pub modules: Vec<ModuleGlob>,
    pub data_files: Vec<DataGlob>,
    pub base_data_path: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory relative patterns are rooted at.
    pub base_dir: PathBuf,
    pub error_level: ErrorLevel,
    /// Never above `error_level`.
    pub shown_error_level: ErrorLevel,
    pub ignored_dirs: Vec<String>,
    pub targets: Vec<Target>,
    pub outputs: Vec<OutputConfig>,
}

impl Config {
    /// Supported configuration file names, in discovery order.
    pub const CONFIG_FILES: &'static [&'static str] = &[
        "lintgrid.json",
        "lintgrid.jsonc",
        ".lintgrid.json",
        ".lintgrid.jsonc",
    ];

    /// Finds the first configuration file in `dir`.
    pub fn discover(dir: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = dir.as_ref();
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LinterError> {
        let path = std::path::absolute(path.as_ref())?;
        let content = fs::read_to_string(&path).map_err(|e| {
            LinterError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        Self::from_jsonc(&content, base_dir)
    }

    /// Parses JSONC text; relative patterns will be rooted at `base_dir`.
    pub fn from_jsonc(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, LinterError> {
        let value = jsonc_parser::parse_to_serde_value(text, &ParseOptions::default())
            .map_err(|e| LinterError::config(format!("Invalid JSON: {e}")))?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        let schema = CONFIG_SCHEMA
            .get_or_init(|| {
                let schema_json: serde_json::Value =
                    serde_json::from_str(SCHEMA_JSON).map_err(|e| e.to_string())?;
                Validator::new(&schema_json).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|e| LinterError::internal(format!("Invalid embedded config schema: {e}")))?;

        if let Err(e) = schema.validate(&value) {
            return Err(LinterError::config(format!(
                "Config validation failed: {} at {}",
                e,
                e.instance_path()
            )));
        }

        let raw: RawConfig = serde_json::from_value(value)
            .map_err(|e| LinterError::config(format!("Invalid config: {e}")))?;
        Self::from_raw(raw, base_dir)
    }

    pub fn from_raw(raw: RawConfig, base_dir: impl Into<PathBuf>) -> Result<Self, LinterError> {
        let error_level = parse_level(raw.error_level.as_deref(), ErrorLevel::Error)?;
        let shown_error_level =
            parse_level(raw.shown_error_level.as_deref(), ErrorLevel::Info)?.min(error_level);

        let ignored_dirs = raw.ignored_dirs.unwrap_or_else(|| {
            DEFAULT_IGNORED_DIRS
                .iter()
                .map(|dir| dir.to_string())
                .collect()
        });

        let targets = raw
            .targets
            .into_iter()
            .enumerate()
            .map(|(index, target)| parse_target(index, target))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_dir: base_dir.into(),
            error_level,
            shown_error_level,
            ignored_dirs,
            targets,
            outputs: raw.outputs,
        })
    }

    pub fn target(&self, id: &str) -> Result<&Target, LinterError> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| LinterError::config(format!("Target `{id}` is not defined")))
    }

    pub fn output(&self, id: &str) -> Result<&OutputConfig, LinterError> {
        self.outputs
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| LinterError::config(format!("Output `{id}` is not defined")))
    }

    pub fn ignore_set(&self) -> Result<IgnoreSet, LinterError> {
        IgnoreSet::from_dirs(&self.ignored_dirs)
    }

    /// Distinct archives the given targets include rules from. Archives only
    /// named by excluded lines are left out.
    pub fn module_archives<'a>(
        targets: impl IntoIterator<Item = &'a Target>,
    ) -> Vec<ModuleArchive> {
        let mut archives = BTreeMap::new();
        for target in targets {
            for module in target.modules.iter().filter(|module| !module.excluded()) {
                archives
                    .entry(module.line.archive.cache_key())
                    .or_insert_with(|| module.line.archive.clone());
            }
        }
        archives.into_values().collect()
    }
}

fn parse_level(level: Option<&str>, default: ErrorLevel) -> Result<ErrorLevel, LinterError> {
    match level {
        None | Some("") => Ok(default),
        Some(level) => level.parse(),
    }
}

fn parse_target(index: usize, raw: RawTarget) -> Result<Target, LinterError> {
    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("target-{index}"));

    let lint_files = raw.lint_files.into_iter().map(parse_lint_glob).collect();

    let modules = raw
        .modules
        .into_iter()
        .map(parse_module)
        .collect::<Result<Vec<_>, _>>()?;

    let data_files = raw
        .data_files
        .iter()
        .map(|pattern| DataGlob::parse(pattern))
        .collect();

    Ok(Target {
        id,
        lint_files,
        modules,
        data_files,
        base_data_path: raw.base_data_path.filter(|p| !p.is_empty()),
    })
}

fn parse_lint_glob(raw: RawGlob) -> LintGlob {
    let (path, config) = match raw {
        RawGlob::Path(path) => (path, None),
        RawGlob::Detail { path, config } => (path, config),
    };
    let (pattern, excluded) = strip_negation(&path);
    LintGlob {
        pattern: pattern.to_string(),
        excluded,
        config,
    }
}

fn parse_module(raw: RawModule) -> Result<ModuleGlob, LinterError> {
    let (path, config, files) = match raw {
        RawModule::Line(path) => (path, None, Vec::new()),
        RawModule::Detail {
            path,
            config,
            files,
        } => (path, config, files),
    };

    let line = ModuleLine::parse(&path)?;
    if line.excluded && !files.is_empty() {
        return Err(LinterError::config(format!(
            "Excluded module `{path}` cannot list files"
        )));
    }

    let files = files
        .into_iter()
        .map(|file| {
            let mut glob = parse_lint_glob(file);
            glob.pattern = clean_in_repo_path(&glob.pattern)
                .map_err(|reason| {
                    LinterError::config(format!("Invalid module file `{}`: {reason}", glob.pattern))
                })?
                .ok_or_else(|| {
                    LinterError::config(format!("Module `{path}` lists an empty file pattern"))
                })?;
            Ok(glob)
        })
        .collect::<Result<Vec<_>, LinterError>>()?;

    Ok(ModuleGlob {
        line,
        config,
        files,
    })
}
