//! lintgrid CLI
//!
//! Runs WebAssembly policy rules over structured data files.

mod cli;
mod commands;
mod output;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(failed) => {
            if failed {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the failure threshold was reached or a fixture failed.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Lint(args) => commands::lint::run_lint(cli, args),
        Commands::Init { force } => commands::init::run_init(*force).map(|_| false),
        Commands::Test(args) => commands::test::run_test(cli, args),
        Commands::New { rule } => commands::new::run_new(rule).map(|_| false),
        Commands::Info => commands::info::run_info(cli).map(|_| false),
    }
}
