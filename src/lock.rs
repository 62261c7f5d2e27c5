use crate::constants::{LOCK_FILE_NAME, STAGED_FRAME_LABEL, UNSTAGED_FRAME_LABEL};
use crate::error::Error;
use crate::vcs::VersionControl;
use crate::warning;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// exclusive claim on a repository's working tree for one run
///
/// two runs isolating the same repository would stash each other's changes
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    /// create the lock file in `git_dir`, failing if another run holds it
    ///
    /// a lock left by a run that no longer exists is taken over, unless that
    /// run's stash entries are still around: they hold the user's changes
    pub fn acquire(git_dir: &Path, vcs: &impl VersionControl) -> Result<Self, Error> {
        let path = git_dir.join(LOCK_FILE_NAME);
        match create(&path) {
            Ok(file) => return Self::claim(path, file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(Error::Io { path, error }),
        }

        clear_stale(&path, vcs)?;
        match create(&path) {
            Ok(file) => Self::claim(path, file),
            // another run got there first
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(held_by(&path)),
            Err(error) => Err(Error::Io { path, error }),
        }
    }

    fn claim(path: PathBuf, mut file: File) -> Result<Self, Error> {
        if let Err(error) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&path);
            return Err(Error::Io { path, error });
        }
        Ok(Self { path, _file: file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warning!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}

fn create(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn held_by(path: &Path) -> Error {
    let holder = read_pid(path).map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
    Error::Environment(format!(
        "another difflint run holds {} (pid {holder}); remove it if that run is gone",
        path.display()
    ))
}

/// remove the lock at `path` if its holder is gone and left nothing stashed
fn clear_stale(path: &Path, vcs: &impl VersionControl) -> Result<(), Error> {
    // an unreadable pid may be a run that hasn't written it yet
    let Some(pid) = read_pid(path) else {
        return Err(held_by(path));
    };
    if is_running(pid) {
        return Err(held_by(path));
    }

    let frames = vcs
        .held_frames(&[UNSTAGED_FRAME_LABEL, STAGED_FRAME_LABEL])
        .map_err(|e| Error::Environment(format!("failed to inspect the stash: {e}")))?;
    if !frames.is_empty() {
        let ids: Vec<&str> = frames.iter().map(|f| f.id.as_str()).collect();
        return Err(Error::Environment(format!(
            "an interrupted difflint run (pid {pid}) left changes in stash entries {}; \
             recover them with `git stash apply --index <id>`, unstaged changes first, \
             then remove {}",
            ids.join(", "),
            path.display()
        )));
    }

    warning!("removing stale lock left by pid {} ({})", pid, path.display());
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(Error::Io {
            path: path.to_path_buf(),
            error,
        }),
    }
}

/// whether a process with this id exists; permission errors still mean it does
#[cfg(unix)]
fn is_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH)),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_running(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeVcs;
    use crate::vcs::Frame;
    use tempfile::TempDir;

    /// a pid no process can have
    const GONE: &str = "4294967295\n";

    #[test]
    fn test_lock_records_pid_and_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::new();
        let path = {
            let lock = RunLock::acquire(dir.path(), &vcs).unwrap();
            let pid = fs::read_to_string(&lock.path).unwrap();
            assert_eq!(pid.trim(), std::process::id().to_string());
            lock.path.clone()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_second_lock_is_refused() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::new();
        let _held = RunLock::acquire(dir.path(), &vcs).unwrap();

        let err = RunLock::acquire(dir.path(), &vcs).unwrap_err();
        assert!(matches!(err, Error::Environment(_)));
        assert!(err.to_string().contains(LOCK_FILE_NAME));
        assert!(err.to_string().contains(&std::process::id().to_string()));
    }

    #[test]
    fn test_lock_can_be_retaken_after_release() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::new();
        drop(RunLock::acquire(dir.path(), &vcs).unwrap());
        assert!(RunLock::acquire(dir.path(), &vcs).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        fs::write(&path, GONE).unwrap();

        let lock = RunLock::acquire(dir.path(), &FakeVcs::new()).unwrap();
        let pid = fs::read_to_string(&lock.path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_lock_with_stranded_changes_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        fs::write(&path, GONE).unwrap();
        let vcs = FakeVcs::new();
        vcs.frames.borrow_mut().push(Frame {
            id: "frame-7".to_string(),
            label: UNSTAGED_FRAME_LABEL.to_string(),
        });

        let err = RunLock::acquire(dir.path(), &vcs).unwrap_err();
        assert!(matches!(err, Error::Environment(_)));
        assert!(err.to_string().contains("frame-7"), "{err}");
        assert_eq!(fs::read_to_string(&path).unwrap(), GONE);
    }

    #[test]
    fn test_lock_without_pid_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        fs::write(&path, "").unwrap();

        let err = RunLock::acquire(dir.path(), &FakeVcs::new()).unwrap_err();
        assert!(err.to_string().contains("pid unknown"), "{err}");
        assert!(path.exists());
    }
}
