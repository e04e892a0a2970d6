//! File system abstraction.
//!
//! Resolution only ever reads, so the trait is a small read-only surface.
//! [`OsFs`] backs it with the real disk and [`MemoryFs`] with an in-memory
//! tree used by tests; the matcher behaves identically on both.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a directory entry. Symbolic links are reported as such and never
/// followed while walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        self == Self::Dir
    }
}

pub trait FileSystem: Send + Sync {
    /// Kind of the entry at `path` without following a final symlink, or
    /// `None` if nothing exists there.
    fn kind(&self, path: &Path) -> io::Result<Option<EntryKind>>;

    /// Children of a directory, sorted by path.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<(PathBuf, EntryKind)>>;

    /// Contents of a file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(kind_of(meta.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<(PathBuf, EntryKind)>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| {
                let entry = entry?;
                Ok((entry.path(), kind_of(entry.file_type()?)))
            })
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

fn kind_of(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    }
}

#[derive(Debug, Clone)]
enum MemEntry {
    File(Vec<u8>),
    Dir,
    Symlink(PathBuf),
}

/// In-memory file system.
///
/// Parent directories are created implicitly when files are added.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    entries: BTreeMap<PathBuf, MemEntry>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path.as_ref(), MemEntry::File(contents.into()));
        self
    }

    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.insert(path.as_ref(), MemEntry::Dir);
        self
    }

    pub fn with_symlink(mut self, path: impl AsRef<Path>, target: impl Into<PathBuf>) -> Self {
        self.insert(path.as_ref(), MemEntry::Symlink(target.into()));
        self
    }

    fn insert(&mut self, path: &Path, entry: MemEntry) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.entries
                .entry(ancestor.to_path_buf())
                .or_insert(MemEntry::Dir);
        }
        self.entries.insert(path.to_path_buf(), entry);
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{}: no such file or directory", path.display()),
        )
    }
}

impl FileSystem for MemoryFs {
    fn kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        Ok(self.entries.get(path).map(|entry| match entry {
            MemEntry::File(_) => EntryKind::File,
            MemEntry::Dir => EntryKind::Dir,
            MemEntry::Symlink(_) => EntryKind::Symlink,
        }))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<(PathBuf, EntryKind)>> {
        match self.entries.get(path) {
            Some(MemEntry::Dir) => {}
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{}: not a directory", path.display()),
                ));
            }
            None => return Err(Self::not_found(path)),
        }

        let mut children = Vec::new();
        for child in self.entries.keys() {
            if child.parent() == Some(path)
                && let Some(kind) = self.kind(child)?
            {
                children.push((child.clone(), kind));
            }
        }
        Ok(children)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.entries.get(path) {
            Some(MemEntry::File(bytes)) => Ok(bytes.clone()),
            Some(MemEntry::Symlink(target)) => self.read(target),
            Some(MemEntry::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{}: is a directory", path.display()),
            )),
            None => Err(Self::not_found(path)),
        }
    }
}
