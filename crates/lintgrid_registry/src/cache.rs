//! Module cache layout.
//!
//! Archives are unpacked under `<root>/<type>/<host>/<owner>/<repo>/<ref>`.
//! The root is `$LINTGRID_ROOT_DIR`, falling back to
//! `${XDG_DATA_HOME:-$HOME/.local/share}/lintgrid`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::{ArchiveError, ModuleArchive};

/// Environment variable overriding the module cache root.
pub const ROOT_DIR_ENV: &str = "LINTGRID_ROOT_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCache {
    root: PathBuf,
}

impl ModuleCache {
    /// Create a module cache at the location given by the environment.
    pub fn new() -> Result<Self, ArchiveError> {
        Self::from_env(|key| std::env::var_os(key))
    }

    /// Create a module cache with a specific root directory.
    pub fn with_dir(path: impl Into<PathBuf>) -> Self {
        Self { root: path.into() }
    }

    fn from_env(var: impl Fn(&str) -> Option<OsString>) -> Result<Self, ArchiveError> {
        let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());

        if let Some(dir) = non_empty(ROOT_DIR_ENV) {
            return Ok(Self::with_dir(dir));
        }

        let data_home = match non_empty("XDG_DATA_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(ArchiveError::DirResolutionFailed)?
                .join(".local")
                .join("share"),
        };
        Ok(Self::with_dir(data_home.join("lintgrid")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local unpack directory of an archive.
    pub fn archive_dir(&self, archive: &ModuleArchive) -> PathBuf {
        self.root.join(archive.file_path())
    }

    pub fn is_installed(&self, archive: &ModuleArchive) -> bool {
        self.archive_dir(archive).is_dir()
    }

    /// Stable module id of a file inside the cache: its slash-form path
    /// relative to the root, with `:<tag>` appended when the archive has one.
    pub fn module_id(&self, archive: &ModuleArchive, file: &Path) -> Result<String, ArchiveError> {
        let relative = file
            .strip_prefix(&self.root)
            .map_err(|_| ArchiveError::OutsideCache {
                path: file.to_path_buf(),
                root: self.root.clone(),
            })?;

        let mut id = to_slash(relative);
        if let Some(tag) = &archive.tag {
            id.push(':');
            id.push_str(tag);
        }
        Ok(id)
    }

    /// Provenance link of a file inside an archive's unpack directory.
    pub fn link(&self, archive: &ModuleArchive, file: &Path) -> Option<String> {
        let in_repo = file.strip_prefix(self.archive_dir(archive)).ok()?;
        Some(archive.link(&to_slash(in_repo)))
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
