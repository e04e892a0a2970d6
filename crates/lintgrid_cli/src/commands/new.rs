//! New command implementation

use std::path::Path;

use lintgrid_core::tester::{RULE_EXTENSION, test_file_for};
use miette::{IntoDiagnostic, Result};
use tracing::info;

use crate::utils::{OnExisting, write_new_file};

const STARTER_FIXTURE: &str = r#"[
  {
    "name": "empty object",
    "param": {
      "data": {
        "text": "{}",
        "value": {},
        "file_path": "data.json",
        "file_type": "json"
      },
      "config": {}
    },
    "result": []
  }
]
"#;

/// Creates the fixture of `rule`, keeping one that already exists.
pub fn run_new(rule: &Path) -> Result<()> {
    if rule.extension().is_none_or(|ext| ext != RULE_EXTENSION) {
        return Err(miette::miette!(
            "Rule file name must end in .{RULE_EXTENSION}: {}",
            rule.display()
        ));
    }

    let fixture = test_file_for(rule);
    if let Some(parent) = fixture.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }

    if write_new_file(&fixture, STARTER_FIXTURE, OnExisting::Keep)? {
        info!("Created {}", fixture.display());
    } else {
        info!("Kept existing {}", fixture.display());
    }
    Ok(())
}
