//! The workspace isolation sequence.
//!
//! Produces lint results for the commit being made ("current") and for the
//! code it replaces ("baseline") by temporarily stashing changes away:
//!
//! 1. capture merge state (isolation discards it)
//! 2. hold unstaged changes, keeping the index applied
//! 3. lint current
//! 4. hold staged changes, leaving the baseline checked out
//! 5. lint baseline
//! 6. reapply the unstaged frame, then the staged frame
//! 7. drop both frames
//! 8. rewrite merge state
//!
//! Steps 2-8 form a critical section over the working tree. `Isolation` owns
//! it: `release` runs steps 6-8 and reports a desync, and dropping an
//! unreleased `Isolation` (early return, panic) still attempts them. Killing
//! the process inside the window leaves changes in the stash.

use crate::changeset::StagedFileSet;
use crate::constants::{STAGED_FRAME_LABEL, UNSTAGED_FRAME_LABEL};
use crate::error::{Desync, Error};
use crate::lint::{LintError, Linter, ResultMapping};
use crate::ui;
use crate::vcs::{Frame, MergeState, VersionControl};
use crate::{info, warning};
use std::fmt;

/// steps of the isolation sequence, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CaptureMergeState,
    IsolateUnstaged,
    LintCurrent,
    IsolateStaged,
    LintBaseline,
    RestoreUnstaged,
    RestoreStaged,
    DiscardFrames,
    RestoreMergeState,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CaptureMergeState => "capture merge state",
            Self::IsolateUnstaged => "isolate unstaged changes",
            Self::LintCurrent => "lint current",
            Self::IsolateStaged => "isolate staged changes",
            Self::LintBaseline => "lint baseline",
            Self::RestoreUnstaged => "restore unstaged changes",
            Self::RestoreStaged => "restore staged changes",
            Self::DiscardFrames => "discard frames",
            Self::RestoreMergeState => "restore merge state",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// a file whose linter crashed on one side of the comparison
#[derive(Debug)]
pub struct LintFailure {
    /// the file's name in the commit being made
    pub path: String,
    pub phase: Phase,
    pub error: LintError,
}

/// lint results from both sides of the commit
#[derive(Debug, Default)]
pub struct Snapshots {
    /// modified or copied files, as committed
    pub current: ResultMapping,
    /// added files, as committed
    pub added: ResultMapping,
    /// renamed files, as committed, under their new names
    pub current_renamed: ResultMapping,
    /// modified or copied files before the commit
    pub baseline: ResultMapping,
    /// renamed files before the commit, under their old names
    pub baseline_renamed: ResultMapping,
    /// files left out of the comparison because a linter crashed
    pub failures: Vec<LintFailure>,
}

impl Snapshots {
    /// drop every result of a file that failed on either side, so one
    /// side's output is never compared against nothing
    pub fn exclude_failures(&mut self, files: &StagedFileSet) {
        for failure in &self.failures {
            let path = failure.path.as_str();
            self.current.remove(path);
            self.baseline.remove(path);
            self.added.remove(path);
            self.current_renamed.remove(path);
            self.baseline_renamed.remove(files.baseline_name(path));
        }
    }
}

/// ownership of the working tree between isolation and restoration
pub struct Isolation<'a, V: VersionControl> {
    vcs: &'a V,
    phase: Phase,
    merge: Option<MergeState>,
    unstaged: Option<Frame>,
    staged: Option<Frame>,
    released: bool,
    verbose: bool,
}

impl<'a, V: VersionControl> Isolation<'a, V> {
    /// step 1: record merge bookkeeping before anything can discard it
    pub fn capture(vcs: &'a V, verbose: bool) -> Result<Self, Error> {
        let mut isolation = Self {
            vcs,
            phase: Phase::Idle,
            merge: None,
            unstaged: None,
            staged: None,
            // nothing to restore until a frame exists
            released: true,
            verbose,
        };
        isolation.enter(Phase::CaptureMergeState);
        isolation.merge = vcs
            .read_merge_state()
            .map_err(|e| Error::Environment(format!("failed to read merge state: {e}")))?;
        isolation.released = false;
        Ok(isolation)
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        if self.verbose {
            info!("difflint: {}", phase);
        }
    }

    /// step 2
    pub fn isolate_unstaged(&mut self) -> Result<(), Error> {
        self.enter(Phase::IsolateUnstaged);
        self.unstaged = match self.vcs.save_frame(UNSTAGED_FRAME_LABEL, true) {
            Ok(frame) => frame,
            Err(e) => {
                // a frame recorded before the failure still holds changes
                self.unstaged = e.held;
                return Err(Error::Isolation {
                    phase: "unstaged changes",
                    error: e.error,
                });
            }
        };
        self.enter(Phase::LintCurrent);
        Ok(())
    }

    /// step 4
    pub fn isolate_staged(&mut self) -> Result<(), Error> {
        self.enter(Phase::IsolateStaged);
        self.staged = match self.vcs.save_frame(STAGED_FRAME_LABEL, false) {
            Ok(frame) => frame,
            Err(e) => {
                self.staged = e.held;
                return Err(Error::Isolation {
                    phase: "staged changes",
                    error: e.error,
                });
            }
        };
        self.enter(Phase::LintBaseline);
        Ok(())
    }

    /// steps 6-8; a desync is fatal and names the frames left behind
    pub fn release(mut self) -> Result<(), Error> {
        self.released = true;
        self.restore().map_err(Error::RestorationDesync)
    }

    fn restore(&mut self) -> Result<(), Desync> {
        let mut desync = Desync::default();
        let frames: Vec<Frame> = [self.unstaged.take(), self.staged.take()]
            .into_iter()
            .flatten()
            .collect();

        // unstaged first: it carries the index as well as the working tree
        let mut applied = 0;
        for frame in &frames {
            let phase = if frame.label == UNSTAGED_FRAME_LABEL {
                Phase::RestoreUnstaged
            } else {
                Phase::RestoreStaged
            };
            self.enter(phase);
            if let Err(e) = self.vcs.apply_frame(frame) {
                desync.failures.push(format!("{phase}: {e}"));
                break;
            }
            applied += 1;
        }

        if applied == frames.len() {
            self.enter(Phase::DiscardFrames);
            for frame in &frames {
                // the changes are back in place; a leftover stash entry is only clutter
                if let Err(e) = self.vcs.drop_frame(frame) {
                    warning!("failed to drop stash entry {} ({}): {}", frame.id, frame.label, e);
                }
            }
        } else {
            // keep every frame so nothing is lost; list the ones not reapplied
            for frame in &frames[..applied] {
                desync
                    .failures
                    .push(format!("stash entry {} was reapplied but kept", frame.id));
            }
            desync.stranded = frames[applied..].to_vec();
        }

        self.enter(Phase::RestoreMergeState);
        if let Some(merge) = &self.merge
            && let Err(e) = self.vcs.write_merge_state(merge)
        {
            desync.failures.push(format!("{}: {e}", Phase::RestoreMergeState));
        }

        self.enter(Phase::Done);
        if desync.failures.is_empty() && desync.stranded.is_empty() {
            Ok(())
        } else {
            Err(desync)
        }
    }
}

impl<V: VersionControl> Drop for Isolation<'_, V> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        warning!("restoring workspace after an interrupted run ({})", self.phase);
        if let Err(desync) = self.restore() {
            ui::alarm("DIFFLINT COULD NOT RESTORE YOUR WORKSPACE", &desync.to_string());
        }
    }
}

/// lint `paths` into `out`; crashes are recorded, anything else aborts
///
/// each entry is (path to lint, name of the file in the commit)
fn lint_phase<'p>(
    linter: &impl Linter,
    mode: Option<&str>,
    phase: Phase,
    paths: impl IntoIterator<Item = (&'p str, &'p str)>,
    out: &mut ResultMapping,
    failures: &mut Vec<LintFailure>,
) -> Result<(), Error> {
    for (path, name) in paths {
        match linter.lint(path, mode) {
            Ok(Some(result)) => out.insert(path, result),
            Ok(None) => {}
            Err(error) if error.is_per_file() => failures.push(LintFailure {
                path: name.to_string(),
                phase,
                error,
            }),
            Err(error) => return Err(Error::Linter(error)),
        }
    }
    Ok(())
}

fn same(paths: &[String]) -> impl Iterator<Item = (&str, &str)> {
    paths.iter().map(|p| (p.as_str(), p.as_str()))
}

/// lint everything that will be committed, in the current working tree
fn lint_current(
    linter: &impl Linter,
    mode: Option<&str>,
    files: &StagedFileSet,
    snapshots: &mut Snapshots,
) -> Result<(), Error> {
    let phase = Phase::LintCurrent;
    let failures = &mut snapshots.failures;
    let modified = same(&files.modified_or_copied);
    lint_phase(linter, mode, phase, modified, &mut snapshots.current, failures)?;
    lint_phase(linter, mode, phase, same(&files.added), &mut snapshots.added, failures)?;
    let renamed = files
        .renames
        .iter()
        .map(|r| (r.new_path.as_str(), r.new_path.as_str()));
    lint_phase(linter, mode, phase, renamed, &mut snapshots.current_renamed, failures)
}

/// lint what existed before: modified files, and renamed files by old name
fn lint_baseline(
    linter: &impl Linter,
    mode: Option<&str>,
    files: &StagedFileSet,
    snapshots: &mut Snapshots,
) -> Result<(), Error> {
    let phase = Phase::LintBaseline;
    let failures = &mut snapshots.failures;
    let modified = same(&files.modified_or_copied);
    lint_phase(linter, mode, phase, modified, &mut snapshots.baseline, failures)?;
    let renamed = files
        .renames
        .iter()
        .map(|r| (r.old_path.as_str(), r.new_path.as_str()));
    lint_phase(linter, mode, phase, renamed, &mut snapshots.baseline_renamed, failures)
}

/// steps 2-5, with restoration left to the caller
fn lint_isolated<V: VersionControl>(
    isolation: &mut Isolation<'_, V>,
    linter: &impl Linter,
    mode: Option<&str>,
    files: &StagedFileSet,
) -> Result<Snapshots, Error> {
    let mut snapshots = Snapshots::default();
    isolation.isolate_unstaged()?;
    lint_current(linter, mode, files, &mut snapshots)?;
    isolation.isolate_staged()?;
    lint_baseline(linter, mode, files, &mut snapshots)?;
    Ok(snapshots)
}

/// run the full isolation sequence and return both sides' lint results
///
/// the workspace is restored before this returns, whatever happened while
/// linting. a restoration desync takes precedence over any other error.
pub fn take_snapshots<V: VersionControl>(
    vcs: &V,
    linter: &impl Linter,
    files: &StagedFileSet,
    mode: Option<&str>,
    verbose: bool,
) -> Result<Snapshots, Error> {
    // nothing to compare: leave the workspace alone entirely
    if !files.current_paths().any(|path| linter.handles(path, mode)) {
        return Ok(Snapshots::default());
    }

    let has_commits = vcs
        .has_commits()
        .map_err(|e| Error::Environment(format!("failed to read HEAD: {e}")))?;
    if !has_commits {
        // isolation needs a commit to stash against, and there's no baseline anyway
        warning!("no commits yet: linting the working tree as-is");
        let mut snapshots = Snapshots::default();
        lint_current(linter, mode, files, &mut snapshots)?;
        return Ok(snapshots);
    }

    let mut isolation = Isolation::capture(vcs, verbose)?;
    let linted = lint_isolated(&mut isolation, linter, mode, files);
    let restored = isolation.release();

    match (linted, restored) {
        (Ok(snapshots), Ok(())) => Ok(snapshots),
        (Err(e), Ok(())) => Err(e),
        (linted, Err(desync)) => {
            if let Err(e) = linted {
                crate::error!("{}", e);
            }
            Err(desync)
        }
    }
}
