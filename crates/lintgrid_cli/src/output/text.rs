//! Text output formatter

use std::io::Write;

use miette::{IntoDiagnostic, Result};
use serde_json::Value;

use super::Payload;

pub fn output_text(payload: &Payload<'_>, out: &mut dyn Write) -> Result<()> {
    for finding in payload.errors {
        let level = finding.level.as_deref().unwrap_or(finding.severity.as_str());

        let mut location = finding.lint_file.clone();
        if let Some(data_file) = &finding.data_file {
            location.push_str(" -> ");
            location.push_str(data_file);
        }

        let mut headline = String::new();
        if !finding.name.is_empty() {
            headline.push_str(&finding.name);
            headline.push_str(": ");
        }
        headline.push_str(&finding.message);

        writeln!(out, "[{level}] {location}: {headline}").into_diagnostic()?;
        if !finding.description.is_empty() {
            writeln!(out, "  {}", finding.description).into_diagnostic()?;
        }
        for link in &finding.links {
            if link.title.is_empty() {
                writeln!(out, "  {}", link.link).into_diagnostic()?;
            } else {
                writeln!(out, "  {}: {}", link.title, link.link).into_diagnostic()?;
            }
        }
        match &finding.custom {
            Some(Value::Object(fields)) => {
                for (key, value) in fields {
                    writeln!(out, "  {key}: {value}").into_diagnostic()?;
                }
            }
            Some(value) => writeln!(out, "  {value}").into_diagnostic()?,
            None => {}
        }
    }

    writeln!(out).into_diagnostic()?;
    writeln!(out, "Found {} errors", payload.errors.len()).into_diagnostic()
}
