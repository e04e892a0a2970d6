//! Lint command implementation

use std::path::PathBuf;

use lintgrid_core::filter::{filter_targets, override_data_files};
use lintgrid_core::{
    Config, ExtismEngine, FileResolver, Linter, OsFs, Renderer, RuleConfig, Target, Thresholds,
};
use lintgrid_registry::{GitHubInstaller, InstallOutcome, ModuleArchive, ModuleCache};
use miette::{IntoDiagnostic, Result};
use tracing::{debug, info};

use crate::cli::{Cli, LintArgs};
use crate::output::write_report;
use crate::utils::create_tokio_runtime;

pub fn run_lint(cli: &Cli, args: &LintArgs) -> Result<bool> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    let config = super::load_config(cli, &cwd)?;

    let thresholds = Thresholds::new(
        args.error_level.unwrap_or(config.error_level),
        args.shown_error_level.unwrap_or(config.shown_error_level),
    );
    let (renderer, output_config) = select_output(&config, args.output.as_deref())?;

    let selected: Vec<Target> = match &args.target {
        Some(id) => vec![config.target(id).into_diagnostic()?.clone()],
        None => config.targets.clone(),
    };

    let cache = ModuleCache::new().into_diagnostic()?;
    install_modules(&cache, Config::module_archives(&selected))?;

    let ignore = config.ignore_set().into_diagnostic()?;
    let resolver = FileResolver::new(&OsFs, &ignore, &cache, &config.base_dir);
    let targets = resolver.resolve(&selected).into_diagnostic()?;
    let targets = if args.target.is_some() {
        override_data_files(targets, &args.paths, &cwd)
    } else {
        let paths: Vec<PathBuf> = args.paths.iter().map(PathBuf::from).collect();
        filter_targets(targets, &paths, &cwd)
    };

    let linter = Linter::new(ExtismEngine::new(), Box::new(OsFs));
    let results = linter.lint(&targets).into_diagnostic()?;
    debug!(results = results.len(), "linted");

    let report = thresholds.apply(&results);
    if report.failed || args.output_success {
        write_report(
            &report,
            renderer,
            &output_config,
            &mut std::io::stdout().lock(),
        )?;
    }
    Ok(report.failed)
}

fn select_output(config: &Config, id: Option<&str>) -> Result<(Renderer, RuleConfig)> {
    match id {
        Some(id) => {
            let output = config.output(id).into_diagnostic()?;
            Ok((output.renderer, output.config.clone()))
        }
        None => Ok((Renderer::default(), RuleConfig::new())),
    }
}

/// Installs every archive missing from the cache.
pub(crate) fn install_modules(cache: &ModuleCache, archives: Vec<ModuleArchive>) -> Result<()> {
    let pending: Vec<ModuleArchive> = archives
        .into_iter()
        .filter(|archive| !cache.is_installed(archive))
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let installer = GitHubInstaller::new()
        .into_diagnostic()?
        .with_token(std::env::var("GITHUB_TOKEN").ok());
    let runtime = create_tokio_runtime()?;

    runtime.block_on(async {
        for archive in &pending {
            match installer.install(archive, cache.root()).await.into_diagnostic()? {
                InstallOutcome::Installed { files } => {
                    info!(module = %archive, files, "installed module");
                }
                InstallOutcome::AlreadyInstalled => {
                    debug!(module = %archive, "module is already installed");
                }
            }
        }
        Ok(())
    })
}
