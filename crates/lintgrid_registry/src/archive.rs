//! Module references.
//!
//! A module line looks like
//! `[!]github_archive/github.com/<owner>/<repo>[/<in-repo glob>]@<commit>[:<tag>]`.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::ArchiveError;

/// Length of a full commit hash.
const COMMIT_HASH_LEN: usize = 40;

/// Supported module sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArchiveType {
    /// Repository tree at a commit, fetched from GitHub.
    GithubArchive,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GithubArchive => "github_archive",
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github_archive" => Ok(Self::GithubArchive),
            other => Err(format!("unsupported module type `{other}`")),
        }
    }
}

/// Identity of an externally sourced rule bundle.
///
/// Two archives with the same type, host, owner, repository and ref share a
/// cache entry; the tag is only used for display and module ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleArchive {
    pub kind: ArchiveType,
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub reference: String,
    pub tag: Option<String>,
}

impl ModuleArchive {
    /// Relative unpack directory: `type/host/owner/repo/ref`.
    pub fn file_path(&self) -> PathBuf {
        [
            self.kind.as_str(),
            self.host.as_str(),
            self.owner.as_str(),
            self.repo.as_str(),
            self.reference.as_str(),
        ]
        .iter()
        .collect()
    }

    /// Cache key, equal for archives that only differ by tag.
    pub fn cache_key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.kind, self.host, self.owner, self.repo, self.reference
        )
    }

    /// Link to a file of this archive on the hosting service.
    pub fn link(&self, in_repo_path: &str) -> String {
        format!(
            "https://{}/{}/{}/blob/{}/{}",
            self.host, self.owner, self.repo, self.reference, in_repo_path
        )
    }
}

impl fmt::Display for ModuleArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        Ok(())
    }
}

/// A parsed module line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLine {
    pub archive: ModuleArchive,
    /// Glob inside the repository, if any.
    pub path: Option<String>,
    pub excluded: bool,
}

impl ModuleLine {
    pub fn parse(line: &str) -> Result<Self, ArchiveError> {
        let (body, excluded) = strip_negation(line);

        let elems: Vec<&str> = body.split('/').collect();
        if elems.len() < 4 {
            return Err(ArchiveError::invalid(
                line,
                "expected <type>/<host>/<owner>/<repo>[/<path>]@<ref>",
            ));
        }

        let kind = elems[0]
            .parse::<ArchiveType>()
            .map_err(|reason| ArchiveError::invalid(line, reason))?;
        let host = elems[1];
        if host != "github.com" {
            return Err(ArchiveError::invalid(line, "module host must be `github.com`"));
        }
        let owner = elems[2];

        let (repo, path, ref_and_tag) = if elems.len() == 4 {
            let (repo, ref_and_tag) = elems[3]
                .split_once('@')
                .ok_or_else(|| ArchiveError::invalid(line, "ref is required"))?;
            (repo, None, ref_and_tag.to_string())
        } else {
            let rest = elems[4..].join("/");
            let (path, ref_and_tag) = rest
                .split_once('@')
                .ok_or_else(|| ArchiveError::invalid(line, "ref is required"))?;
            let path = clean_in_repo_path(path).map_err(|r| ArchiveError::invalid(line, r))?;
            (elems[3], path, ref_and_tag.to_string())
        };

        if !is_safe_segment(owner) || !is_safe_segment(repo) {
            return Err(ArchiveError::invalid(
                line,
                "repository owner and name must be plain path segments",
            ));
        }

        let (reference, tag) = match ref_and_tag.split_once(':') {
            Some((r, t)) => (r, Some(t)),
            None => (ref_and_tag.as_str(), None),
        };
        if !is_full_commit_hash(reference) {
            return Err(ArchiveError::invalid(line, "ref must be a full commit hash"));
        }

        Ok(Self {
            archive: ModuleArchive {
                kind,
                host: host.to_string(),
                owner: owner.to_string(),
                repo: repo.to_string(),
                reference: reference.to_string(),
                tag: tag.filter(|t| !t.is_empty()).map(str::to_string),
            },
            path,
            excluded,
        })
    }

    /// Slash-separated pattern relative to the cache root:
    /// `type/host/owner/repo/ref[/path]`.
    pub fn slash_path(&self) -> String {
        match &self.path {
            Some(path) => format!("{}/{}", self.archive.cache_key(), path),
            None => self.archive.cache_key(),
        }
    }
}

/// Splits a leading `!` off a pattern.
pub fn strip_negation(pattern: &str) -> (&str, bool) {
    let trimmed = pattern.trim();
    match trimmed.strip_prefix('!') {
        Some(rest) => (rest.trim(), true),
        None => (trimmed, false),
    }
}

fn is_full_commit_hash(reference: &str) -> bool {
    reference.len() == COMMIT_HASH_LEN && reference.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_safe_segment(s: &str) -> bool {
    let mut components = Path::new(s).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) => c == s,
        _ => false,
    }
}

/// Normalizes an in-repository glob, rejecting anything that could leave the archive.
pub fn clean_in_repo_path(path: &str) -> Result<Option<String>, String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err("'..' is forbidden".to_string()),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const REF: &str = "0123456789abcdef0123456789abcdef01234567";

    fn archive(tag: Option<&str>) -> ModuleArchive {
        ModuleArchive {
            kind: ArchiveType::GithubArchive,
            host: "github.com".to_string(),
            owner: "acme".to_string(),
            repo: "policies".to_string(),
            reference: REF.to_string(),
            tag: tag.map(str::to_string),
        }
    }

    #[test]
    fn parses_line_with_path_and_tag() {
        let line = format!("github_archive/github.com/acme/policies/rules/*.wasm@{REF}:v1.2.0");
        let parsed = ModuleLine::parse(&line).unwrap();

        assert_eq!(parsed.archive, archive(Some("v1.2.0")));
        assert_eq!(parsed.path.as_deref(), Some("rules/*.wasm"));
        assert!(!parsed.excluded);
        assert_eq!(
            parsed.slash_path(),
            format!("github_archive/github.com/acme/policies/{REF}/rules/*.wasm")
        );
    }

    #[test]
    fn parses_whole_repository_line() {
        let line = format!("github_archive/github.com/acme/policies@{REF}");
        let parsed = ModuleLine::parse(&line).unwrap();

        assert_eq!(parsed.archive, archive(None));
        assert_eq!(parsed.path, None);
        assert_eq!(
            parsed.slash_path(),
            format!("github_archive/github.com/acme/policies/{REF}")
        );
    }

    #[test]
    fn parses_negation() {
        let line = format!(" ! github_archive/github.com/acme/policies/rules/skip.wasm@{REF}");
        let parsed = ModuleLine::parse(&line).unwrap();

        assert!(parsed.excluded);
        assert_eq!(parsed.path.as_deref(), Some("rules/skip.wasm"));
    }

    #[test]
    fn cleans_in_repo_path() {
        let line = format!("github_archive/github.com/acme/policies/./rules//a.wasm@{REF}");
        let parsed = ModuleLine::parse(&line).unwrap();
        assert_eq!(parsed.path.as_deref(), Some("rules/a.wasm"));
    }

    #[rstest]
    #[case::too_short("github_archive/github.com/acme")]
    #[case::unknown_type("tarball/github.com/acme/policies@0123456789abcdef0123456789abcdef01234567")]
    #[case::unknown_host("github_archive/gitlab.com/acme/policies@0123456789abcdef0123456789abcdef01234567")]
    #[case::missing_ref("github_archive/github.com/acme/policies/rules/*.wasm")]
    #[case::short_ref("github_archive/github.com/acme/policies/rules/*.wasm@v1.0.0")]
    #[case::non_hex_ref("github_archive/github.com/acme/policies@0123456789abcdef0123456789abcdef0123456z")]
    #[case::parent_dir("github_archive/github.com/acme/policies/../x.wasm@0123456789abcdef0123456789abcdef01234567")]
    #[case::dot_owner("github_archive/github.com/../policies@0123456789abcdef0123456789abcdef01234567")]
    fn rejects_invalid_lines(#[case] line: &str) {
        let err = ModuleLine::parse(line).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidLine { .. }), "{err}");
        assert!(err.to_string().contains(line.trim()));
    }

    #[test]
    fn file_path_ignores_tag() {
        assert_eq!(archive(Some("v1")).file_path(), archive(None).file_path());
        assert_eq!(archive(Some("v1")).cache_key(), archive(None).cache_key());
        assert_eq!(
            archive(None).file_path(),
            PathBuf::from("github_archive")
                .join("github.com")
                .join("acme")
                .join("policies")
                .join(REF)
        );
    }

    #[test]
    fn display_appends_tag() {
        assert_eq!(
            archive(Some("v1")).to_string(),
            format!("github_archive/github.com/acme/policies/{REF}:v1")
        );
    }

    #[test]
    fn link_points_at_pinned_blob() {
        assert_eq!(
            archive(None).link("rules/a.wasm"),
            format!("https://github.com/acme/policies/blob/{REF}/rules/a.wasm")
        );
    }

    #[rstest]
    #[case::plain("a.json", ("a.json", false))]
    #[case::negated("!a.json", ("a.json", true))]
    #[case::spaced("  ! a.json ", ("a.json", true))]
    fn strips_negation(#[case] input: &str, #[case] expected: (&str, bool)) {
        assert_eq!(strip_negation(input), expected);
    }
}
