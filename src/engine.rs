//! One regression run, from staged changes to the log on disk.

use crate::changeset::StagedFileSet;
use crate::defect::{DefectMatcher, detect_new_defects};
use crate::diff::{FileDelta, RenameMap, diff_results, report_added_files};
use crate::error::Error;
use crate::lint::Linter;
use crate::report::RegressionReport;
use crate::snapshot::{LintFailure, take_snapshots};
use crate::vcs::VersionControl;
use std::path::PathBuf;

pub struct Options {
    /// language dialect forced for every file
    pub mode: Option<String>,
    /// trace every isolation step
    pub verbose: bool,
    pub log_path: PathBuf,
}

/// how one committed file compares to what it replaces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// output unchanged
    Clean,
    /// output changed but nothing new was introduced
    Improved,
    /// new findings introduced
    Regressed,
}

impl Verdict {
    pub fn is_regression(self) -> bool {
        self == Self::Regressed
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub any_new_errors: bool,
    /// committed files that were linted, in classification order
    pub verdicts: Vec<(String, Verdict)>,
    /// files excluded from the comparison because a linter crashed
    pub failures: Vec<LintFailure>,
    pub log_written: bool,
}

fn verdicts_for(
    deltas: &[FileDelta],
    linted: impl Iterator<Item = String>,
    matcher: &dyn DefectMatcher,
) -> Vec<(String, Verdict)> {
    linted
        .map(|path| {
            let verdict = match deltas.iter().find(|d| d.path == path) {
                None => Verdict::Clean,
                Some(d) if detect_new_defects(&d.delta, matcher) => Verdict::Regressed,
                Some(_) => Verdict::Improved,
            };
            (path, verdict)
        })
        .collect()
}

/// lint both sides of the staged commit and record any regression
///
/// the workspace is restored before the report is written. with nothing
/// staged, or nothing lintable, the workspace is never touched and any
/// previous log is removed.
pub fn run<V: VersionControl>(
    vcs: &V,
    linter: &impl Linter,
    matcher: &dyn DefectMatcher,
    options: &Options,
) -> Result<Outcome, Error> {
    let files = StagedFileSet::classify(vcs).map_err(Error::Classification)?;
    let mut snapshots = take_snapshots(
        vcs,
        linter,
        &files,
        options.mode.as_deref(),
        options.verbose,
    )?;
    snapshots.exclude_failures(&files);

    let mut report = RegressionReport::new();
    let mut deltas = diff_results(
        &snapshots.baseline,
        &snapshots.current,
        &RenameMap::new(),
        &mut report,
    );
    let added = report_added_files(&snapshots.added, &mut report);
    let renames: RenameMap = files
        .renames
        .iter()
        .map(|r| (r.new_path.clone(), r.old_path.clone()))
        .collect();
    deltas.extend(diff_results(
        &snapshots.baseline_renamed,
        &snapshots.current_renamed,
        &renames,
        &mut report,
    ));

    let mut verdicts = verdicts_for(
        &deltas,
        snapshots.current.iter().map(|(p, _)| p.to_string()),
        matcher,
    );
    verdicts.extend(snapshots.added.iter().map(|(path, _)| {
        let verdict = if added.iter().any(|a| a == path) {
            Verdict::Regressed
        } else {
            Verdict::Clean
        };
        (path.to_string(), verdict)
    }));
    verdicts.extend(verdicts_for(
        &deltas,
        snapshots.current_renamed.iter().map(|(p, _)| p.to_string()),
        matcher,
    ));

    let any_new_errors = report.classify(matcher);
    let log_written = report.finalize(&options.log_path).map_err(|error| Error::Io {
        path: options.log_path.clone(),
        error,
    })?;

    Ok(Outcome {
        any_new_errors,
        verdicts,
        failures: snapshots.failures,
        log_written,
    })
}
