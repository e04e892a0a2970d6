//! JSON output formatter

use std::io::Write;

use miette::{IntoDiagnostic, Result};

use super::Payload;

pub fn output_json(payload: &Payload<'_>, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, payload).into_diagnostic()?;
    writeln!(out).into_diagnostic()
}
