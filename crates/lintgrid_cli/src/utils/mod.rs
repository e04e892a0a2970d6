//! CLI utility functions

use std::io::{ErrorKind, Write};
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use tokio::runtime::Runtime;

pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// `<os>/<arch>` of the running binary.
pub fn env_string() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// What [`write_new_file`] does when `path` already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExisting {
    Fail,
    Replace,
    Keep,
}

/// Writes `contents` to a freshly created `path`, never through a symlink.
/// Returns whether the file was written.
pub fn write_new_file(path: &Path, contents: &str, on_existing: OnExisting) -> Result<bool> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NOFOLLOW);
    }

    loop {
        let err = match options.open(path) {
            Ok(mut file) => {
                file.write_all(contents.as_bytes()).into_diagnostic()?;
                return Ok(true);
            }
            Err(e) => e,
        };
        if err.kind() != ErrorKind::AlreadyExists {
            return Err(err).into_diagnostic();
        }
        match on_existing {
            OnExisting::Keep => return Ok(false),
            OnExisting::Fail => {
                return Err(miette::miette!("{} already exists", path.display()));
            }
            OnExisting::Replace => match std::fs::remove_file(path) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e).into_diagnostic(),
                _ => {}
            },
        }
    }
}
