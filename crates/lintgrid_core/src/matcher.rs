//! Glob matching over a [`FileSystem`].
//!
//! Patterns are absolute, slash-separated globs. `*` never crosses a path
//! separator and `**` matches any number of directories. Walking prunes every
//! entry matched by the ignore set before looking at its children and never
//! follows symbolic links. Ignore patterns see paths relative to the directory
//! the pattern was rooted at.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::LinterError;
use crate::fs::{EntryKind, FileSystem};

/// Directories never walked into unless configured otherwise.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[".git", "node_modules"];

const GLOB_META: &[char] = &['*', '?', '[', '{', '\\'];

/// A compiled absolute glob.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    matcher: GlobMatcher,
    base: PathBuf,
}

impl Pattern {
    pub fn new(pattern: impl Into<String>) -> Result<Self, LinterError> {
        let raw = pattern.into();
        let matcher = compile(&raw)?.compile_matcher();
        Ok(Self {
            raw,
            matcher,
            base: PathBuf::from("/"),
        })
    }

    /// Joins a possibly relative pattern onto `base` and compiles it.
    pub fn rooted(base: &Path, pattern: &str) -> Result<Self, LinterError> {
        let mut compiled = Self::new(join_pattern(base, pattern))?;
        compiled.base = base.to_path_buf();
        Ok(compiled)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.matcher.is_match(to_slash(path))
    }

    /// Longest leading run of literal segments; nothing outside it can match.
    fn walk_root(&self) -> PathBuf {
        let literal: Vec<&str> = self
            .raw
            .split('/')
            .take_while(|segment| !segment.contains(GLOB_META))
            .collect();
        match literal.as_slice() {
            [] => PathBuf::from("."),
            [""] => PathBuf::from("/"),
            segments => PathBuf::from(segments.join("/")),
        }
    }

    /// Depth below which nothing can match, unless the pattern contains `**`.
    fn max_depth(&self) -> Option<usize> {
        if self.raw.split('/').any(|segment| segment.contains("**")) {
            None
        } else {
            Some(self.raw.split('/').count())
        }
    }
}

fn compile(pattern: &str) -> Result<globset::Glob, LinterError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| LinterError::config(format!("Invalid glob pattern `{pattern}`: {e}")))
}

/// Paths whose subtrees are never walked.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    set: GlobSet,
}

impl IgnoreSet {
    /// Builds `**/<dir>` and `**/<dir>/**` patterns for each directory name.
    pub fn from_dirs<S: AsRef<str>>(dirs: &[S]) -> Result<Self, LinterError> {
        let patterns: Vec<String> = dirs
            .iter()
            .flat_map(|dir| {
                let dir = dir.as_ref().trim_matches('/');
                [format!("**/{dir}"), format!("**/{dir}/**")]
            })
            .collect();
        Self::from_patterns(patterns)
    }

    pub fn from_patterns(patterns: Vec<String>) -> Result<Self, LinterError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(compile(pattern)?);
        }
        let set = builder
            .build()
            .map_err(|e| LinterError::config(format!("Failed to build globset: {e}")))?;
        Ok(Self { set })
    }

    /// Matches `path` relative to `base`. Paths outside `base` are matched
    /// as they are.
    pub fn is_ignored(&self, base: &Path, path: &Path) -> bool {
        match path.strip_prefix(base) {
            Ok(relative) => self.set.is_match(to_slash(relative)),
            Err(_) => self.set.is_match(to_slash(path)),
        }
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }
}

/// Glob matching and walking against an injected file system.
pub struct PatternMatcher<'a> {
    fs: &'a dyn FileSystem,
    ignore: &'a IgnoreSet,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(fs: &'a dyn FileSystem, ignore: &'a IgnoreSet) -> Self {
        Self { fs, ignore }
    }

    /// Tests a single path against a pattern string.
    pub fn matches(pattern: &str, path: &Path) -> Result<bool, LinterError> {
        Ok(Pattern::new(pattern)?.is_match(path))
    }

    /// Every non-directory entry matching the pattern, in walk order.
    pub fn glob(&self, pattern: &Pattern) -> Result<Vec<PathBuf>, LinterError> {
        let mut found = Vec::new();
        self.walk(pattern, |path, kind| {
            if !kind.is_dir() {
                found.push(path.to_path_buf());
            }
            Ok(())
        })?;
        Ok(found)
    }

    /// Calls `visit` for every entry matching the pattern, directories included.
    pub fn walk<F>(&self, pattern: &Pattern, mut visit: F) -> Result<(), LinterError>
    where
        F: FnMut(&Path, EntryKind) -> Result<(), LinterError>,
    {
        let root = pattern.walk_root();
        let kind = self
            .fs
            .kind(&root)
            .map_err(|e| LinterError::resolve(&root, e))?;
        let Some(kind) = kind else {
            debug!(pattern = pattern.as_str(), "walk root does not exist");
            return Ok(());
        };
        if self.ignore.is_ignored(&pattern.base, &root) {
            return Ok(());
        }

        if pattern.is_match(&root) {
            visit(&root, kind)?;
        }
        if kind.is_dir() {
            self.walk_dir(&root, pattern, pattern.max_depth(), &mut visit)?;
        }
        Ok(())
    }

    fn walk_dir<F>(
        &self,
        dir: &Path,
        pattern: &Pattern,
        max_depth: Option<usize>,
        visit: &mut F,
    ) -> Result<(), LinterError>
    where
        F: FnMut(&Path, EntryKind) -> Result<(), LinterError>,
    {
        let entries = self
            .fs
            .read_dir(dir)
            .map_err(|e| LinterError::resolve(dir, e))?;

        for (path, kind) in entries {
            if self.ignore.is_ignored(&pattern.base, &path) {
                debug!(path = %path.display(), "skipping ignored path");
                continue;
            }
            if pattern.is_match(&path) {
                visit(&path, kind)?;
            }
            if kind.is_dir() && max_depth.is_none_or(|max| depth(&path) < max) {
                self.walk_dir(&path, pattern, max_depth, visit)?;
            }
        }
        Ok(())
    }
}

fn depth(path: &Path) -> usize {
    to_slash(path).split('/').count()
}

/// Slash-separated form of a path.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Lexically cleans a slash path: collapses `//`, drops `.` and resolves `..`
/// against preceding segments.
pub fn clean_slash(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Roots a relative pattern at `base`. Absolute patterns are only cleaned.
pub fn join_pattern(base: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() || pattern.starts_with('/') {
        clean_slash(pattern)
    } else {
        clean_slash(&format!("{}/{}", to_slash(base), pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn repo() -> MemoryFs {
        MemoryFs::new()
            .with_file("/repo/a.json", "{}")
            .with_file("/repo/b.yaml", "a: 1")
            .with_file("/repo/sub/c.json", "{}")
            .with_file("/repo/sub/deep/d.json", "{}")
            .with_file("/repo/.git/config.json", "{}")
            .with_file("/repo/node_modules/pkg/e.json", "{}")
    }

    fn default_ignore() -> IgnoreSet {
        IgnoreSet::from_dirs(DEFAULT_IGNORED_DIRS).unwrap()
    }

    #[rstest]
    #[case::star_in_dir("/repo/*.json", "/repo/a.json", true)]
    #[case::star_does_not_cross("/repo/*.json", "/repo/sub/c.json", false)]
    #[case::double_star_zero_dirs("/repo/**/*.json", "/repo/a.json", true)]
    #[case::double_star_many_dirs("/repo/**/*.json", "/repo/sub/deep/d.json", true)]
    #[case::alternation("/repo/*.{json,yaml}", "/repo/b.yaml", true)]
    #[case::literal("/repo/a.json", "/repo/a.json", true)]
    #[case::question_mark("/repo/?.json", "/repo/ab.json", false)]
    fn matches_patterns(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(
            PatternMatcher::matches(pattern, Path::new(path)).unwrap(),
            expected
        );
    }

    #[test]
    fn rejects_malformed_pattern() {
        let err = Pattern::new("/repo/[a.json").unwrap_err();
        assert!(matches!(err, LinterError::Config(ref m) if m.contains("/repo/[a.json")));
    }

    #[test]
    fn glob_walks_recursively_and_prunes_ignored_dirs() {
        let fs = repo();
        let ignore = default_ignore();
        let matcher = PatternMatcher::new(&fs, &ignore);

        let found = matcher
            .glob(&Pattern::new("/repo/**/*.json").unwrap())
            .unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("/repo/a.json"),
                PathBuf::from("/repo/sub/c.json"),
                PathBuf::from("/repo/sub/deep/d.json"),
            ]
        );
    }

    #[test]
    fn ignored_dir_contents_never_match_specific_patterns() {
        let fs = repo();
        let ignore = default_ignore();
        let matcher = PatternMatcher::new(&fs, &ignore);

        let found = matcher
            .glob(&Pattern::new("/repo/.git/config.json").unwrap())
            .unwrap();
        assert!(found.is_empty());

        let found = matcher
            .glob(&Pattern::new("/repo/node_modules/**/*.json").unwrap())
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn ignore_set_only_sees_paths_below_the_pattern_base() {
        let fs = MemoryFs::new()
            .with_file("/work/node_modules/proj/a.json", "{}")
            .with_file("/work/node_modules/proj/sub/b.json", "{}")
            .with_file("/work/node_modules/proj/node_modules/dep/c.json", "{}");
        let ignore = default_ignore();
        let matcher = PatternMatcher::new(&fs, &ignore);

        let found = matcher
            .glob(&Pattern::rooted(Path::new("/work/node_modules/proj"), "**/*.json").unwrap())
            .unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("/work/node_modules/proj/a.json"),
                PathBuf::from("/work/node_modules/proj/sub/b.json"),
            ]
        );
    }

    #[rstest]
    #[case::inside_base("/p", "/p/.git/x", true)]
    #[case::base_itself_named_ignored("/work/.git", "/work/.git/x", false)]
    #[case::outside_base("/p", "/q/node_modules/x", true)]
    #[case::plain("/p", "/p/src/x", false)]
    fn ignore_set_matches_relative_paths(
        #[case] base: &str,
        #[case] path: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            default_ignore().is_ignored(Path::new(base), Path::new(path)),
            expected
        );
    }

    #[test]
    fn without_ignore_set_everything_is_walked() {
        let fs = repo();
        let ignore = IgnoreSet::default();
        let matcher = PatternMatcher::new(&fs, &ignore);

        let found = matcher
            .glob(&Pattern::new("/repo/.git/*.json").unwrap())
            .unwrap();
        assert_eq!(found, vec![PathBuf::from("/repo/.git/config.json")]);
    }

    #[test]
    fn walk_reports_directories_but_glob_skips_them() {
        let fs = repo();
        let ignore = default_ignore();
        let matcher = PatternMatcher::new(&fs, &ignore);
        let pattern = Pattern::new("/repo/*").unwrap();

        let mut dirs = Vec::new();
        matcher
            .walk(&pattern, |path, kind| {
                if kind.is_dir() {
                    dirs.push(path.to_path_buf());
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(dirs, vec![PathBuf::from("/repo/sub")]);

        let files = matcher.glob(&pattern).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("/repo/a.json"), PathBuf::from("/repo/b.yaml")]
        );
    }

    #[test]
    fn walk_does_not_follow_symlinks() {
        let fs = MemoryFs::new()
            .with_file("/outside/x.json", "{}")
            .with_symlink("/repo/linked", "/outside");
        let ignore = default_ignore();
        let matcher = PatternMatcher::new(&fs, &ignore);

        let found = matcher
            .glob(&Pattern::new("/repo/**/*.json").unwrap())
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn missing_walk_root_matches_nothing() {
        let fs = repo();
        let ignore = default_ignore();
        let matcher = PatternMatcher::new(&fs, &ignore);

        let found = matcher
            .glob(&Pattern::new("/elsewhere/**/*.json").unwrap())
            .unwrap();
        assert!(found.is_empty());
    }

    #[rstest]
    #[case::relative("/cfg", "rules/*.wasm", "/cfg/rules/*.wasm")]
    #[case::dot_prefix("/cfg", "./rules/a.wasm", "/cfg/rules/a.wasm")]
    #[case::parent("/cfg/sub", "../data/*.json", "/cfg/data/*.json")]
    #[case::absolute("/cfg", "/abs//x/*.json", "/abs/x/*.json")]
    fn joins_patterns(#[case] base: &str, #[case] pattern: &str, #[case] expected: &str) {
        assert_eq!(join_pattern(Path::new(base), pattern), expected);
    }

    #[rstest]
    #[case::literal_prefix("/repo/sub/*.json", "/repo/sub")]
    #[case::double_star("/repo/**/x.json", "/repo")]
    #[case::fully_literal("/repo/a.json", "/repo/a.json")]
    #[case::root_glob("/*.json", "/")]
    fn computes_walk_root(#[case] pattern: &str, #[case] expected: &str) {
        assert_eq!(
            Pattern::new(pattern).unwrap().walk_root(),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    #[case::relative_parent("../a/../b", "../b")]
    #[case::absolute_parent("/../a", "/a")]
    #[case::empty("", ".")]
    fn cleans_slash_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_slash(input), expected);
    }
}
