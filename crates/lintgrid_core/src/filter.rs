//! Narrowing resolved targets to paths given on the command line.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::matcher::{clean_slash, to_slash};
use crate::resolver::{ResolvedDataFile, ResolvedTarget};

/// Lexically absolute form of `path`, relative paths taken from `cwd`.
pub fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    PathBuf::from(clean_slash(&to_slash(&joined)))
}

/// Keeps, per target, the lint files named in `paths` (with all data files),
/// or else the data files named in `paths` (with all lint files). Targets
/// left without lint files are dropped.
pub fn filter_targets(
    targets: Vec<ResolvedTarget>,
    paths: &[PathBuf],
    cwd: &Path,
) -> Vec<ResolvedTarget> {
    if paths.is_empty() {
        return targets;
    }
    let paths: Vec<PathBuf> = paths.iter().map(|p| absolutize(cwd, p)).collect();

    targets
        .into_iter()
        .filter_map(|target| {
            let filtered = filter_target(target, &paths);
            if filtered.lint_files.is_empty() {
                debug!(target = %filtered.id, "no lint file or data file matches the given paths");
                None
            } else {
                Some(filtered)
            }
        })
        .collect()
}

fn filter_target(target: ResolvedTarget, paths: &[PathBuf]) -> ResolvedTarget {
    let lint_files: Vec<_> = target
        .lint_files
        .iter()
        .filter(|f| paths.contains(&f.path))
        .cloned()
        .collect();
    if !lint_files.is_empty() {
        return ResolvedTarget {
            lint_files,
            ..target
        };
    }

    let data_files: Vec<_> = target
        .data_files
        .iter()
        .filter(|f| paths.contains(&f.abs))
        .cloned()
        .collect();
    if data_files.is_empty() {
        return ResolvedTarget {
            lint_files: Vec::new(),
            data_files,
            ..target
        };
    }
    ResolvedTarget {
        data_files,
        ..target
    }
}

/// Replaces the data files of a single selected target with `paths`, shown
/// as typed. Only the first resolved directory of the target is kept.
pub fn override_data_files(
    mut targets: Vec<ResolvedTarget>,
    paths: &[String],
    cwd: &Path,
) -> Vec<ResolvedTarget> {
    if paths.is_empty() {
        return targets;
    }
    targets.truncate(1);
    if let Some(target) = targets.first_mut() {
        target.data_files = paths
            .iter()
            .map(|raw| ResolvedDataFile::new(raw.clone(), absolutize(cwd, Path::new(raw))))
            .collect();
    }
    targets
}
