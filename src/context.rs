use crate::cli::Cli;
use crate::constants::LOG_FILE;
use crate::engine::Options;
use std::path::{Path, PathBuf};

/// everything one invocation needs to know about where and how it runs
pub struct RunContext {
    /// working tree root; linters run here and paths are relative to it
    pub root: PathBuf,

    /// where the lock lives
    pub git_dir: PathBuf,

    /// regression log, at the root of the working tree
    pub log_path: PathBuf,

    /// forced language, from --mode
    pub mode: Option<String>,

    /// trace isolation steps
    pub verbose: bool,

    /// exit non-zero on regressions
    pub reject: bool,
}

impl RunContext {
    pub fn new(cli: &Cli, root: &Path, git_dir: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            git_dir: git_dir.to_path_buf(),
            log_path: root.join(LOG_FILE),
            mode: cli.mode.clone(),
            verbose: cli.verbose,
            reject: cli.reject,
        }
    }

    pub fn engine_options(&self) -> Options {
        Options {
            mode: self.mode.clone(),
            verbose: self.verbose,
            log_path: self.log_path.clone(),
        }
    }
}
