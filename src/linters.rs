use crate::config::{Config, Language, LinterSpec, Reporter};
use crate::lint::{LintError, LintResult, Linter};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;
use wait_timeout::ChildExt;

/// a linter referenced by the configuration whose program isn't on PATH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingLinter {
    pub language: String,
    pub linter: String,
    pub program: String,
}

/// config-driven linter dispatch by file extension
pub struct Registry {
    root: PathBuf,
    languages: Vec<(String, Language)>,
    linters: BTreeMap<String, LinterSpec>,
    timeout: Duration,
    reporters: OnceCell<TempDir>,
}

impl Registry {
    /// resolve every linter the configuration names
    ///
    /// linters run with `root` as their working directory
    pub fn new(config: &Config, root: &Path) -> Result<Self, LintError> {
        let mut linters = BTreeMap::new();
        for name in config.enabled_linters() {
            let spec = config.linter(name).ok_or_else(|| {
                LintError::Config(format!("unknown linter in configuration: \"{name}\""))
            })?;
            if shlex::split(&spec.command).is_none_or(|argv| argv.is_empty()) {
                return Err(LintError::Config(format!(
                    "invalid command for linter \"{name}\": {}",
                    spec.command
                )));
            }
            linters.insert(name.to_string(), spec);
        }

        Ok(Self {
            root: root.to_path_buf(),
            languages: config
                .languages
                .iter()
                .map(|(name, language)| (name.clone(), language.clone()))
                .collect(),
            linters,
            timeout: Duration::from_secs(config.timeout_secs),
            reporters: OnceCell::new(),
        })
    }

    /// languages claiming the file's extension, narrowed by `mode`
    fn languages_for(&self, path: &str, mode: Option<&str>) -> Vec<&(String, Language)> {
        let Some(ext) = Path::new(path).extension().map(|e| e.to_string_lossy()) else {
            return Vec::new();
        };
        self.languages
            .iter()
            .filter(|(_, language)| language.extensions.iter().any(|e| *e == ext))
            .filter(|(name, _)| mode.is_none_or(|mode| name.as_str() == mode))
            .collect()
    }

    /// configured linters whose program can't be found
    pub fn missing_executables(&self) -> Vec<MissingLinter> {
        self.missing(self.languages.iter())
    }

    /// missing linters among those needed for `paths`
    pub fn missing_for<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a str>,
        mode: Option<&str>,
    ) -> Vec<MissingLinter> {
        let mut needed: Vec<&(String, Language)> = Vec::new();
        for path in paths {
            for language in self.languages_for(path, mode) {
                if !needed.iter().any(|n| n.0 == language.0) {
                    needed.push(language);
                }
            }
        }
        self.missing(needed.into_iter())
    }

    fn missing<'a>(
        &self,
        languages: impl Iterator<Item = &'a (String, Language)>,
    ) -> Vec<MissingLinter> {
        let mut missing = Vec::new();
        for (language, config) in languages {
            for linter in &config.linters {
                let Some(program) = self.linters.get(linter).and_then(program_of) else {
                    continue;
                };
                if which::which(&program).is_err() {
                    missing.push(MissingLinter {
                        language: language.clone(),
                        linter: linter.clone(),
                        program,
                    });
                }
            }
        }
        missing
    }

    /// write the embedded reporter scripts out once per run
    fn reporter_path(&self, reporter: Reporter) -> Result<PathBuf, LintError> {
        if self.reporters.get().is_none() {
            let dir = TempDir::new().map_err(|e| {
                LintError::Config(format!("failed to create reporter directory: {e}"))
            })?;
            for reporter in [Reporter::Eslint, Reporter::Jshint] {
                let path = dir.path().join(reporter.file_name());
                fs::write(&path, reporter.source()).map_err(|e| {
                    LintError::Config(format!("failed to write {}: {e}", path.display()))
                })?;
            }
            let _ = self.reporters.set(dir);
        }
        let dir = self
            .reporters
            .get()
            .ok_or_else(|| LintError::Config("reporter directory unavailable".to_string()))?;
        Ok(dir.path().join(reporter.file_name()))
    }

    /// build argv for `spec`, substituting placeholders token by token
    fn argv(&self, spec: &LinterSpec, path: &str) -> Result<Vec<String>, LintError> {
        let reporter = match spec.reporter {
            Some(reporter) => Some(self.reporter_path(reporter)?),
            None => None,
        };
        let tokens = shlex::split(&spec.command)
            .ok_or_else(|| LintError::Config(format!("invalid command: {}", spec.command)))?;
        Ok(tokens
            .into_iter()
            .map(|token| {
                let token = token.replace("{path}", path);
                match &reporter {
                    Some(reporter) => token.replace("{reporter}", &reporter.to_string_lossy()),
                    None => token,
                }
            })
            .collect())
    }

    fn run(&self, name: &str, spec: &LinterSpec, path: &str) -> Result<LintResult, LintError> {
        let crash = |message: String| LintError::Crash {
            linter: name.to_string(),
            path: path.to_string(),
            message,
        };

        let argv = self.argv(spec, path)?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| LintError::Config(format!("empty command for linter \"{name}\"")))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                // not specific to this file: every other file would fail the same way
                io::ErrorKind::NotFound => LintError::Config(format!(
                    "linter \"{name}\" needs `{program}`, which is not on PATH"
                )),
                _ => crash(format!("failed to run {program}: {e}")),
            })?;

        // drain pipes on their own threads so a chatty linter can't block on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(crash(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            Err(e) => return Err(crash(format!("failed to wait for {program}: {e}"))),
        };

        let stdout = collect(stdout).map_err(&crash)?;
        let stderr = collect(stderr).map_err(&crash)?;

        match status.code() {
            Some(0) => Ok(LintResult::new(stdout, false)),
            Some(code) if spec.finding_exit_codes.contains(&code) => {
                Ok(LintResult::new(stdout, true))
            }
            Some(code) => Err(crash(format!(
                "exited with status {code}: {}",
                stderr.trim()
            ))),
            None => Err(crash(format!("terminated by signal: {}", stderr.trim()))),
        }
    }
}

fn program_of(spec: &LinterSpec) -> Option<String> {
    shlex::split(&spec.command)?.into_iter().next()
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut data = Vec::new();
        pipe.read_to_end(&mut data)?;
        Ok(data)
    })
}

fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<String, String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let data = handle
        .join()
        .map_err(|_| "output reader panicked".to_string())?
        .map_err(|e| format!("failed to read output: {e}"))?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

impl Linter for Registry {
    fn lint(&self, path: &str, mode: Option<&str>) -> Result<Option<LintResult>, LintError> {
        let languages = self.languages_for(path, mode);
        if languages.is_empty() {
            return Ok(None);
        }
        // e.g. the baseline side of a copy
        if !self.root.join(path).is_file() {
            return Ok(None);
        }

        let mut result = LintResult::default();
        for (_, language) in languages {
            for name in &language.linters {
                let spec = self.linters.get(name).ok_or_else(|| {
                    LintError::Config(format!("unknown linter in configuration: \"{name}\""))
                })?;
                result.merge(self.run(name, spec, path)?);
            }
        }
        Ok(Some(result))
    }

    fn handles(&self, path: &str, mode: Option<&str>) -> bool {
        !self.languages_for(path, mode).is_empty()
    }
}
