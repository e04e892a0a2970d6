//! Info command implementation

use lintgrid_registry::ModuleCache;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::Cli;
use crate::utils::env_string;

#[derive(Debug, Serialize)]
struct Info {
    version: &'static str,
    env: String,
    root_dir: String,
    config_file: Option<String>,
}

pub fn run_info(cli: &Cli) -> Result<()> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    let cache = ModuleCache::new().into_diagnostic()?;

    let info = Info {
        version: env!("CARGO_PKG_VERSION"),
        env: env_string(),
        root_dir: cache.root().display().to_string(),
        config_file: super::config_path(cli, &cwd).map(|p| p.display().to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&info).into_diagnostic()?);
    Ok(())
}
