//! Subcommand implementations

pub mod info;
pub mod init;
pub mod lint;
pub mod new;

use std::path::{Path, PathBuf};

use lintgrid_core::Config;
use miette::{IntoDiagnostic, Result};

use crate::cli::Cli;

/// `--config`, else the first configuration file found in `cwd`.
pub fn config_path(cli: &Cli, cwd: &Path) -> Option<PathBuf> {
    cli.config.clone().or_else(|| Config::discover(cwd))
}

pub fn load_config(cli: &Cli, cwd: &Path) -> Result<Config> {
    let path = config_path(cli, cwd).ok_or_else(|| {
        miette::miette!(
            "No configuration file found (looked for {}). Run `lintgrid init` to create one.",
            Config::CONFIG_FILES.join(", ")
        )
    })?;
    Config::from_file(&path).into_diagnostic()
}
