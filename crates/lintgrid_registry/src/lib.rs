//! lintgrid module registry.
//!
//! Modules are externally sourced bundles of rule files pinned to a commit.
//! This crate parses module references, maps them onto the local cache
//! layout and (with the `install` feature) downloads them.

pub mod archive;
pub mod cache;
pub mod error;
#[cfg(feature = "install")]
pub mod installer;

pub use archive::{ArchiveType, ModuleArchive, ModuleLine};
pub use cache::{ModuleCache, ROOT_DIR_ENV};
pub use error::ArchiveError;
#[cfg(feature = "install")]
pub use installer::{GitHubInstaller, InstallError, InstallOutcome};
