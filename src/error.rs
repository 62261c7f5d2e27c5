use crate::lint::LintError;
use crate::vcs::{Frame, VcsError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// fatal conditions of a regression run
///
/// each message carries its cause inline, so none of them report a separate
/// error source
#[derive(Debug, Error)]
pub enum Error {
    /// a required tool is missing, or we're not where we need to be
    #[error("{0}")]
    Environment(String),

    #[error("failed to classify staged changes: {0}")]
    Classification(VcsError),

    /// a holding frame could not be created
    #[error("failed to isolate {phase}: {error}")]
    Isolation { phase: &'static str, error: VcsError },

    /// a linter failure that could not be confined to a single file
    #[error("linting aborted: {0}")]
    Linter(LintError),

    #[error("{0}")]
    RestorationDesync(Desync),

    #[error("failed to write {}: {error}", path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
}

/// the two-frame restoration did not complete cleanly
///
/// frames listed in `stranded` were not dropped and still hold user changes
#[derive(Debug, Default)]
pub struct Desync {
    pub failures: Vec<String>,
    pub stranded: Vec<Frame>,
}

impl fmt::Display for Desync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "workspace restoration did not complete")?;
        for failure in &self.failures {
            writeln!(f, "  {failure}")?;
        }
        if self.stranded.is_empty() {
            return Ok(());
        }
        writeln!(f, "uncommitted changes remain in these stash entries:")?;
        for frame in &self.stranded {
            writeln!(f, "  {} ({})", frame.id, frame.label)?;
        }
        write!(
            f,
            "recover them with `git stash apply --index <id>`, unstaged changes first"
        )
    }
}

impl std::error::Error for Desync {}
