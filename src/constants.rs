// report
pub const LOG_FILE: &str = "lintdiff.log";

// config
pub const CONFIG_FILE_NAME: &str = ".difflintrc";
pub const USER_CONFIG_DIR: &str = "difflint";
pub const USER_CONFIG_FILE_NAME: &str = "difflintrc";

// linters
pub const DEFAULT_LINTER_TIMEOUT_SECS: u64 = 60;

// holding frames
pub const UNSTAGED_FRAME_LABEL: &str = "difflint: unstaged changes";
pub const STAGED_FRAME_LABEL: &str = "difflint: staged changes";

// locking
pub const LOCK_FILE_NAME: &str = "difflint.lock";

// exit codes
pub const EXIT_REGRESSION: i32 = 1;
pub const EXIT_LINTER_FAILURE: i32 = 2;
pub const EXIT_DESYNC: i32 = 3;
