use clap::Parser;
use std::path::PathBuf;

/// difflint: fail commits that introduce new linting errors
///
/// lints every staged file as committed and as it was before, and records
/// only the findings the commit introduces in lintdiff.log
#[derive(Parser, Debug)]
#[command(name = "difflint", about, long_about = None)]
pub struct Cli {
    /// verify the configuration and that every linter is installed, then exit
    #[arg(long)]
    pub check: bool,

    /// configuration file (default: .difflintrc in the repository root)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// lint every file as this language
    #[arg(long, value_name = "LANGUAGE")]
    pub mode: Option<String>,

    /// exit non-zero when new linting errors are found
    #[arg(long)]
    pub reject: bool,

    /// print each step of the workspace isolation
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
