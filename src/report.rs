use crate::defect::{DefectMatcher, detect_new_defects};
use chrono::Utc;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// separator written before every block (two blank lines)
const BLOCK_SEPARATOR: &str = "\n\n\n";

/// accumulated log body for one run
#[derive(Debug, Default)]
pub struct RegressionReport {
    body: String,
    any_new_errors: bool,
}

impl RegressionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_block(&mut self, block: &str) {
        self.body.push_str(BLOCK_SEPARATOR);
        self.body.push_str(block);
    }

    /// mark the run as regressed regardless of the body's contents
    pub fn flag_new_errors(&mut self) {
        self.any_new_errors = true;
    }

    #[cfg(test)]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[cfg(test)]
    pub fn any_new_errors(&self) -> bool {
        self.any_new_errors
    }

    /// fold the line classifier's verdict over the whole body into the flag
    pub fn classify(&mut self, matcher: &dyn DefectMatcher) -> bool {
        if detect_new_defects(&self.body, matcher) {
            self.any_new_errors = true;
        }
        self.any_new_errors
    }

    /// persist the log when new errors were found, remove any old one otherwise
    ///
    /// returns whether new errors were found
    pub fn finalize(self, log_path: &Path) -> io::Result<bool> {
        if !self.any_new_errors {
            match fs::remove_file(log_path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            return Ok(false);
        }

        // write next to the target and rename, so a crash never leaves half a log
        let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(header().as_bytes())?;
        file.write_all(self.body.as_bytes())?;
        file.flush()?;
        file.persist(log_path).map_err(|e| e.error)?;
        Ok(true)
    }
}

/// UTC timestamp line opening the log
fn header() -> String {
    format!("{}\n", Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"))
}
