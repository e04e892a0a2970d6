//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lintgrid_core::ErrorLevel;

/// lintgrid - run WebAssembly policy rules over structured data files
#[derive(Parser)]
#[command(name = "lintgrid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LINTGRID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint data files
    Lint(LintArgs),

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Run rule fixtures (`<rule>_test.json`)
    Test(TestArgs),

    /// Create a fixture for a rule
    New {
        /// Rule file the fixture belongs to
        #[arg(default_value = "main.wasm")]
        rule: PathBuf,
    },

    /// Show version, environment and paths
    Info,
}

#[derive(Args, Debug, Default)]
pub struct LintArgs {
    /// Lint files or data files to restrict the run to
    pub paths: Vec<String>,

    /// Only lint this target; given paths become its data files
    #[arg(short, long)]
    pub target: Option<String>,

    /// Minimum level that fails the run
    #[arg(short, long, env = "LINTGRID_ERROR_LEVEL", value_parser = parse_level)]
    pub error_level: Option<ErrorLevel>,

    /// Minimum level that is reported
    #[arg(long, env = "LINTGRID_SHOWN_ERROR_LEVEL", value_parser = parse_level)]
    pub shown_error_level: Option<ErrorLevel>,

    /// Write output even when the run succeeds
    #[arg(long, env = "LINTGRID_OUTPUT_SUCCESS")]
    pub output_success: bool,

    /// Id of a configured output
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct TestArgs {
    /// Rules, fixtures or directories to test instead of the configured rules
    pub paths: Vec<PathBuf>,

    /// Only test the rules of this target
    #[arg(short, long)]
    pub target: Option<String>,
}

fn parse_level(s: &str) -> Result<ErrorLevel, String> {
    s.parse().map_err(|e: lintgrid_core::LinterError| e.to_string())
}
