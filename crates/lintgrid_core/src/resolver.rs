//! Target resolution.
//!
//! Every pattern list (rule files, modules, data files) is folded in
//! declaration order into a [`MatchMap`]. An inclusion walks the file system
//! and appends entries; an exclusion deletes the entries already present
//! whose path matches. A later inclusion may therefore re-add a path an
//! earlier exclusion removed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use lintgrid_registry::ModuleCache;
use serde::Serialize;
use tracing::debug;

use crate::LinterError;
use crate::config::{DataGlob, LintGlob, ModuleGlob, RuleConfig, Target};
use crate::fs::FileSystem;
use crate::matcher::{IgnoreSet, Pattern, PatternMatcher, clean_slash, to_slash};

/// Concrete rule file of a target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLintFile {
    /// Slash path relative to the config directory, or the module id.
    pub id: String,
    pub path: PathBuf,
    pub config: RuleConfig,
    /// Provenance link for module files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Concrete data file of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDataFile {
    /// Path as shown to the user.
    pub raw: String,
    /// Path used for I/O.
    pub abs: PathBuf,
}

impl ResolvedDataFile {
    pub fn new(raw: impl Into<String>, abs: impl Into<PathBuf>) -> Self {
        Self {
            raw: raw.into(),
            abs: abs.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTarget {
    pub id: String,
    pub lint_files: Vec<ResolvedLintFile>,
    pub data_files: Vec<ResolvedDataFile>,
}

/// Running match state of one pattern list.
#[derive(Debug)]
struct MatchMap<T> {
    entries: BTreeMap<PathBuf, Vec<T>>,
}

impl<T> MatchMap<T> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn push(&mut self, path: PathBuf, entry: T) {
        self.entries.entry(path).or_default().push(entry);
    }

    fn replace(&mut self, path: PathBuf, entry: T) {
        self.entries.insert(path, vec![entry]);
    }

    /// Drops every path matching `pattern`; returns how many were dropped.
    fn exclude(&mut self, pattern: &Pattern) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !pattern.is_match(path));
        let removed = before - self.entries.len();
        debug!(pattern = pattern.as_str(), removed, "applied exclusion");
        removed
    }

    fn merge(&mut self, other: MatchMap<T>) {
        for (path, entries) in other.entries {
            self.entries.entry(path).or_default().extend(entries);
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn into_values(self) -> Vec<T> {
        self.entries.into_values().flatten().collect()
    }
}

/// Config of a resolved lint file. A file entry's config replaces the
/// module or glob config, which replaces nothing.
pub fn merge_config(module: Option<&RuleConfig>, file: Option<&RuleConfig>) -> RuleConfig {
    file.or(module).cloned().unwrap_or_default()
}

/// `foo_test.wasm`-style files are rule fixtures, never rules.
pub fn is_test_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with("_test"))
}

/// Resolves configured targets into concrete file sets.
pub struct FileResolver<'a> {
    matcher: PatternMatcher<'a>,
    cache: &'a ModuleCache,
    base_dir: &'a Path,
}

impl<'a> FileResolver<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        ignore: &'a IgnoreSet,
        cache: &'a ModuleCache,
        base_dir: &'a Path,
    ) -> Self {
        Self {
            matcher: PatternMatcher::new(fs, ignore),
            cache,
            base_dir,
        }
    }

    pub fn resolve(&self, targets: &[Target]) -> Result<Vec<ResolvedTarget>, LinterError> {
        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            resolved.extend(self.resolve_target(target)?);
        }
        Ok(resolved)
    }

    /// Resolves one target. Yields one [`ResolvedTarget`] per base data
    /// directory, or exactly one without a base data path.
    pub fn resolve_target(&self, target: &Target) -> Result<Vec<ResolvedTarget>, LinterError> {
        let mut lint_files = self.resolve_lint_files(&target.lint_files)?;
        lint_files.extend(self.resolve_modules(&target.modules)?);
        debug!(
            target = %target.id,
            lint_files = ?lint_files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(),
            "found lint files"
        );

        let data_sets = self.resolve_data_files(target)?;
        Ok(data_sets
            .into_iter()
            .map(|data_files| {
                debug!(
                    target = %target.id,
                    data_files = ?data_files.iter().map(|f| f.raw.as_str()).collect::<Vec<_>>(),
                    "found data files"
                );
                ResolvedTarget {
                    id: target.id.clone(),
                    lint_files: lint_files.clone(),
                    data_files,
                }
            })
            .collect())
    }

    pub fn resolve_lint_files(
        &self,
        globs: &[LintGlob],
    ) -> Result<Vec<ResolvedLintFile>, LinterError> {
        let mut matches = MatchMap::new();

        for glob in globs {
            let pattern = Pattern::rooted(self.base_dir, &glob.pattern)?;
            if glob.excluded {
                matches.exclude(&pattern);
                continue;
            }

            let found = self.rule_files(&pattern)?;
            for path in found {
                let id = relative_slash(self.base_dir, &path);
                matches.push(
                    path.clone(),
                    ResolvedLintFile {
                        id,
                        path,
                        config: merge_config(glob.config.as_ref(), None),
                        link: None,
                    },
                );
            }
        }

        Ok(matches.into_values())
    }

    pub fn resolve_modules(
        &self,
        modules: &[ModuleGlob],
    ) -> Result<Vec<ResolvedLintFile>, LinterError> {
        let mut matches = MatchMap::new();

        for module in modules {
            // A bare archive reference stands for every rule file in it.
            let module_pattern = match (&module.line.path, module.excluded()) {
                (Some(_), _) => module.line.slash_path(),
                (None, true) => format!("{}/**", module.line.slash_path()),
                (None, false) => format!("{}/**/*.wasm", module.line.slash_path()),
            };
            let module_pattern = Pattern::rooted(self.cache.root(), &module_pattern)?;

            if module.excluded() {
                matches.exclude(&module_pattern);
                continue;
            }

            let mut local = MatchMap::new();
            if module.files.is_empty() {
                self.collect_module_files(&module_pattern, module, None, &mut local)?;
            }
            for file in &module.files {
                let pattern = Pattern::rooted(
                    self.cache.root(),
                    &format!("{}/{}", module.line.slash_path(), file.pattern),
                )?;
                if file.excluded {
                    local.exclude(&pattern);
                } else {
                    self.collect_module_files(&pattern, module, Some(file), &mut local)?;
                }
            }

            if local.is_empty() {
                debug!(module = %module.line.slash_path(), "no file matches");
            }
            matches.merge(local);
        }

        Ok(matches.into_values())
    }

    fn collect_module_files(
        &self,
        pattern: &Pattern,
        module: &ModuleGlob,
        file: Option<&LintGlob>,
        matches: &mut MatchMap<ResolvedLintFile>,
    ) -> Result<(), LinterError> {
        let archive = &module.line.archive;
        for path in self.rule_files(pattern)? {
            let entry = ResolvedLintFile {
                id: self.cache.module_id(archive, &path)?,
                link: self.cache.link(archive, &path),
                config: merge_config(module.config.as_ref(), file.and_then(|f| f.config.as_ref())),
                path: path.clone(),
            };
            matches.push(path, entry);
        }
        Ok(())
    }

    /// Files matching `pattern`, minus rule test fixtures.
    fn rule_files(&self, pattern: &Pattern) -> Result<Vec<PathBuf>, LinterError> {
        let found: Vec<PathBuf> = self
            .matcher
            .glob(pattern)?
            .into_iter()
            .filter(|path| !is_test_file(path))
            .collect();
        if found.is_empty() {
            debug!(pattern = pattern.as_str(), "no file matches");
        }
        Ok(found)
    }

    /// Data files of a target, one set per base data directory.
    pub fn resolve_data_files(
        &self,
        target: &Target,
    ) -> Result<Vec<Vec<ResolvedDataFile>>, LinterError> {
        let Some(base_data_path) = &target.base_data_path else {
            return Ok(vec![self.resolve_data_globs(&target.data_files, self.base_dir)?]);
        };

        let pattern = Pattern::rooted(self.base_dir, base_data_path)?;
        let mut roots = BTreeSet::new();
        self.matcher.walk(&pattern, |path, kind| {
            let root = if kind.is_dir() {
                path.to_path_buf()
            } else {
                path.parent().unwrap_or(path).to_path_buf()
            };
            roots.insert(root);
            Ok(())
        })?;
        if roots.is_empty() {
            debug!(pattern = pattern.as_str(), "no base data directory matches");
        }

        let mut sets = Vec::with_capacity(roots.len());
        for root in roots {
            let prefix = relative_slash(self.base_dir, &root);
            let files = self
                .resolve_data_globs(&target.data_files, &root)?
                .into_iter()
                .map(|mut file| {
                    if !Path::new(&file.raw).is_absolute() {
                        file.raw = clean_slash(&format!("{prefix}/{}", file.raw));
                    }
                    file
                })
                .collect();
            sets.push(files);
        }
        Ok(sets)
    }

    fn resolve_data_globs(
        &self,
        globs: &[DataGlob],
        root: &Path,
    ) -> Result<Vec<ResolvedDataFile>, LinterError> {
        let mut matches = MatchMap::new();

        for glob in globs {
            let pattern = Pattern::rooted(root, &glob.pattern)?;
            if glob.excluded {
                matches.exclude(&pattern);
                continue;
            }

            let is_absolute = Path::new(&glob.pattern).is_absolute();
            let found = self.matcher.glob(&pattern)?;
            if found.is_empty() {
                debug!(pattern = pattern.as_str(), "no file matches");
            }
            for path in found {
                let raw = if is_absolute {
                    to_slash(&path)
                } else {
                    relative_slash(root, &path)
                };
                matches.replace(path.clone(), ResolvedDataFile::new(raw, path));
            }
        }

        Ok(matches.into_values())
    }
}

/// Lexical slash path from `base` to `path`; both are expected to be absolute.
fn relative_slash(base: &Path, path: &Path) -> String {
    if let Ok(relative) = path.strip_prefix(base) {
        let s = to_slash(relative);
        return if s.is_empty() { ".".to_string() } else { s };
    }

    let base: Vec<_> = base.components().collect();
    let path: Vec<_> = path.components().collect();
    let common = base.iter().zip(&path).take_while(|(a, b)| a == b).count();

    let mut parts = vec!["..".to_string(); base.len() - common];
    parts.extend(
        path[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}
