//! `.difflintrc` loading.
//!
//! The file maps languages to extensions and linters, and optionally defines
//! extra linter commands. Lookup order: an explicit path, the repository
//! root, the user config directory, then the built-in default.

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_LINTER_TIMEOUT_SECS, USER_CONFIG_DIR, USER_CONFIG_FILE_NAME,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {error}", path.display())]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error(
        "failed to parse {}: {error} \
         (make sure it's valid JSON, or remove it to use the defaults)",
        path.display()
    )]
    Parse {
        path: PathBuf,
        error: serde_json::Error,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub extensions: Vec<String>,
    pub linters: Vec<String>,
}

/// an external linter invocation
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LinterSpec {
    /// shell-style command line; `{path}` and `{reporter}` are substituted
    pub command: String,

    /// exit codes meaning "ran fine, found problems"
    #[serde(default = "default_finding_exit_codes")]
    pub finding_exit_codes: Vec<i32>,

    /// embedded reporter script written out for `{reporter}`
    #[serde(skip)]
    pub reporter: Option<Reporter>,
}

/// terse reporters shipped inside the binary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reporter {
    Eslint,
    Jshint,
}

impl Reporter {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Eslint => "eslint_terse_reporter.js",
            Self::Jshint => "jshint_terse_reporter.js",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Self::Eslint => include_str!("../data/eslint_terse_reporter.js"),
            Self::Jshint => include_str!("../data/jshint_terse_reporter.js"),
        }
    }
}

fn default_finding_exit_codes() -> Vec<i32> {
    vec![1]
}

fn default_timeout_secs() -> u64 {
    DEFAULT_LINTER_TIMEOUT_SECS
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// language name -> extensions and linters, in name order
    #[serde(default)]
    pub languages: BTreeMap<String, Language>,

    /// user-defined linters, overriding built-ins of the same name
    #[serde(default)]
    pub linters: BTreeMap<String, LinterSpec>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// regex replacing the default defect-record pattern
    #[serde(default)]
    pub defect_pattern: Option<String>,

    /// where this configuration came from (None for the built-in default)
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let languages = [
            ("javascript", &["js"][..], &["eslint"][..]),
            ("python", &["py", "pyw"][..], &["flake8"][..]),
        ]
        .into_iter()
        .map(|(name, extensions, linters)| {
            let language = Language {
                extensions: extensions.iter().map(ToString::to_string).collect(),
                linters: linters.iter().map(ToString::to_string).collect(),
            };
            (name.to_string(), language)
        })
        .collect();

        Self {
            languages,
            linters: BTreeMap::new(),
            timeout_secs: DEFAULT_LINTER_TIMEOUT_SECS,
            defect_pattern: None,
            source: None,
        }
    }
}

impl Config {
    /// load configuration for the repository rooted at `root`
    ///
    /// an explicit path must exist; the implicit locations are optional
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        for candidate in Self::candidates(root) {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// implicit lookup locations, most specific first
    pub fn candidates(root: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![root.join(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE_NAME));
        }
        candidates
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        let mut config: Self =
            serde_json::from_str(&text).map_err(|error| ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// resolve a linter by name, user definitions first
    pub fn linter(&self, name: &str) -> Option<LinterSpec> {
        self.linters.get(name).cloned().or_else(|| builtin_linter(name))
    }

    /// every linter name referenced by a language, deduplicated, in order
    pub fn enabled_linters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for language in self.languages.values() {
            for linter in &language.linters {
                if !names.contains(&linter.as_str()) {
                    names.push(linter);
                }
            }
        }
        names
    }
}

/// linters difflint knows how to run without configuration
pub fn builtin_linter(name: &str) -> Option<LinterSpec> {
    let (command, finding_exit_codes, reporter) = match name {
        "eslint" => ("eslint --format {reporter} {path}", vec![1], Some(Reporter::Eslint)),
        // jshint exits 2 when it reports errors
        "jshint" => ("jshint --reporter {reporter} {path}", vec![1, 2], Some(Reporter::Jshint)),
        "pycodestyle" => (
            "pycodestyle '--format=%(path)s|%(code)s|%(text)s' {path}",
            vec![1],
            None,
        ),
        "flake8" => (
            "flake8 '--format=%(path)s|%(code)s|%(text)s' {path}",
            vec![1],
            None,
        ),
        _ => return None,
    };
    Some(LinterSpec {
        command: command.to_string(),
        finding_exit_codes,
        reporter,
    })
}
