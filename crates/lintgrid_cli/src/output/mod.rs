//! Output formatting module

mod json;
mod text;

use std::io::Write;

use lintgrid_core::{Finding, Renderer, Report, RuleConfig};
use miette::Result;
use serde::Serialize;

use crate::utils::env_string;

/// Document handed to renderers.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub lintgrid_version: &'static str,
    pub env: String,
    pub errors: &'a [Finding],
    pub config: &'a RuleConfig,
}

impl<'a> Payload<'a> {
    pub fn new(errors: &'a [Finding], config: &'a RuleConfig) -> Self {
        Self {
            lintgrid_version: env!("CARGO_PKG_VERSION"),
            env: env_string(),
            errors,
            config,
        }
    }
}

pub fn write_report(
    report: &Report,
    renderer: Renderer,
    config: &RuleConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let payload = Payload::new(&report.findings, config);
    match renderer {
        Renderer::Json => json::output_json(&payload, out),
        Renderer::Text => text::output_text(&payload, out),
    }
}
