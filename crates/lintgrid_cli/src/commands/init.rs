//! Init command implementation

use std::path::PathBuf;

use lintgrid_core::Config;
use miette::Result;
use tracing::info;

use crate::utils::{OnExisting, write_new_file};

const STARTER_CONFIG: &str = r#"{
  "error_level": "error",
  "shown_error_level": "info",
  "targets": [
    {
      "id": "default",
      "lint_files": ["lint/*.wasm"],
      "data_files": ["**/*.json", "**/*.yaml"]
    }
  ]
}
"#;

pub fn run_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(Config::CONFIG_FILES[0]);
    let on_existing = if force {
        OnExisting::Replace
    } else {
        OnExisting::Keep
    };

    if !write_new_file(&config_path, STARTER_CONFIG, on_existing)? {
        return Err(miette::miette!(
            "Config file already exists. Use --force to overwrite."
        ));
    }
    info!("Created {}", config_path.display());
    Ok(())
}
