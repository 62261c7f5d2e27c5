mod changeset;
mod cli;
mod config;
mod constants;
mod context;
mod defect;
mod diff;
mod engine;
mod error;
mod git;
mod lint;
mod linters;
mod lock;
mod report;
mod snapshot;
#[cfg(test)]
mod testing;
mod ui;
mod vcs;

use crate::changeset::StagedFileSet;
use crate::cli::Cli;
use crate::config::Config;
use crate::constants::{EXIT_DESYNC, EXIT_LINTER_FAILURE, EXIT_REGRESSION};
use crate::context::RunContext;
use crate::defect::PatternMatcher;
use crate::engine::{Outcome, Verdict};
use crate::error::Error;
use crate::git::GitRepo;
use crate::linters::{MissingLinter, Registry};
use crate::lock::RunLock;
use crate::ui::Spinner;
use anyhow::{Context, Result, bail};
use std::path::Path;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse_args();

    // sanity checks
    git::sanity_check()?;
    let repo = GitRepo::discover(Path::new("."))?;
    let ctx = RunContext::new(&cli, repo.workdir(), repo.git_dir());

    let config = Config::load(cli.config.as_deref(), &ctx.root)?;
    let registry = Registry::new(&config, &ctx.root)?;
    let matcher = match &config.defect_pattern {
        Some(pattern) => PatternMatcher::new(pattern)
            .with_context(|| format!("invalid defect_pattern: {pattern}"))?,
        None => PatternMatcher::default(),
    };

    if cli.check {
        return Ok(check(&config, &registry));
    }

    let _lock = RunLock::acquire(&ctx.git_dir, &repo)?;

    // every linter this commit needs must exist before the workspace is touched
    let files = StagedFileSet::classify(&repo).map_err(Error::Classification)?;
    let missing = registry.missing_for(files.lint_paths(), ctx.mode.as_deref());
    if !missing.is_empty() {
        report_missing(&missing);
        bail!(Error::Environment("required linters are not installed".to_string()));
    }

    let outcome = {
        // verbose tracing and a spinner don't share a terminal well
        let message = format!("linting {} staged files...", files.len());
        let _spinner = (!ctx.verbose).then(|| Spinner::start(&message));
        engine::run(&repo, &registry, &matcher, &ctx.engine_options())
    };

    match outcome {
        Ok(outcome) => Ok(summarize(&outcome, &ctx)),
        Err(Error::RestorationDesync(desync)) => {
            ui::alarm("DIFFLINT COULD NOT RESTORE YOUR WORKSPACE", &desync.to_string());
            Ok(EXIT_DESYNC)
        }
        Err(e) => Err(e.into()),
    }
}

/// print per-file verdicts and pick the exit code
fn summarize(outcome: &Outcome, ctx: &RunContext) -> i32 {
    for (path, verdict) in &outcome.verdicts {
        match verdict {
            Verdict::Regressed => warning!("{} introduced linting errors", path),
            Verdict::Improved | Verdict::Clean => {
                status!("{} introduced no new linting errors", path);
            }
        }
    }

    for failure in &outcome.failures {
        error!(
            "{} was not compared ({}): {}",
            failure.path, failure.phase, failure.error
        );
    }

    if outcome.log_written {
        warning!("new linting errors written to {}", ctx.log_path.display());
    }

    let regressed = outcome.any_new_errors
        || outcome.verdicts.iter().any(|(_, v)| v.is_regression());
    if ctx.reject && regressed {
        EXIT_REGRESSION
    } else if ctx.reject && !outcome.failures.is_empty() {
        EXIT_LINTER_FAILURE
    } else {
        0
    }
}

fn report_missing(missing: &[MissingLinter]) {
    for m in missing {
        error!(
            "{} linter \"{}\" needs `{}`, which is not on PATH",
            m.language, m.linter, m.program
        );
    }
}

/// --check: report the configuration in use and any linter that can't run
fn check(config: &Config, registry: &Registry) -> i32 {
    match &config.source {
        Some(path) => status!("configuration: {}", path.display()),
        None => status!("configuration: built-in default"),
    }
    for (name, language) in &config.languages {
        info!(
            "  {} (.{}): {}",
            name,
            language.extensions.join(", ."),
            language.linters.join(", ")
        );
    }

    let missing = registry.missing_executables();
    if missing.is_empty() {
        status!("all linters found");
        return 0;
    }
    report_missing(&missing);
    1
}
