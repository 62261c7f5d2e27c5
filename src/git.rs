use crate::vcs::{
    ChangeFilter, ChangeKind, Frame, MergeState, Rename, SaveFrameError, VcsError, VersionControl,
};
use git2::{Delta, DiffFindOptions, Index, Repository};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

const MERGE_HEAD: &str = "MERGE_HEAD";
const MERGE_MSG: &str = "MERGE_MSG";
const MERGE_MODE: &str = "MERGE_MODE";

/// holding frames are made with the git binary, so it has to be installed
pub fn sanity_check() -> Result<(), VcsError> {
    which::which("git")
        .map(|_| ())
        .map_err(|e| VcsError::new("locate git", format!("git not found on PATH: {e}")))
}

/// git-backed implementation of the version-control primitives
///
/// queries go through git2; anything that mutates the working tree goes
/// through the git binary so hooks, the index lock and `GIT_INDEX_FILE`
/// behave the way they do for the surrounding `git commit`
pub struct GitRepo {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepo {
    /// discover the repository containing `path`
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        let op = "open repository";
        let repo = Repository::discover(path)
            .map_err(|e| VcsError::new(op, format!("not in a git repository: {e}")))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| VcsError::new(op, "bare repositories have no working tree"))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// the `.git` directory
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// the index the pending commit will be made from
    ///
    /// `git commit -a` and `git commit <paths>` run hooks against a temporary
    /// index named by GIT_INDEX_FILE; libgit2 doesn't look at that variable
    fn commit_index(&self) -> Result<Index, VcsError> {
        if let Some(path) = std::env::var_os("GIT_INDEX_FILE") {
            let path = self.workdir.join(PathBuf::from(path));
            return Index::open(&path).map_err(|e| {
                VcsError::new("read index", format!("failed to open {}: {e}", path.display()))
            });
        }
        self.repo
            .index()
            .map_err(|e| VcsError::new("read index", format!("failed to get git index: {e}")))
    }

    /// staged diff with rename and copy detection
    fn staged_diff(&self) -> Result<git2::Diff<'_>, VcsError> {
        let op = "diff staged changes";

        // unborn branch (no commits yet): compare against the empty tree
        let tree = match self.repo.head() {
            Ok(head) => Some(
                head.peel_to_tree()
                    .map_err(|e| VcsError::new(op, format!("failed to get tree: {e}")))?,
            ),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(VcsError::new(op, format!("failed to get HEAD: {e}"))),
        };

        let index = self.commit_index()?;
        let mut diff = self
            .repo
            .diff_tree_to_index(tree.as_ref(), Some(&index), None)
            .map_err(|e| VcsError::new(op, format!("failed to create diff: {e}")))?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        find_opts.copies(true);
        find_opts.rename_threshold(50); // 50% similarity (git default)
        find_opts.copy_threshold(50);
        diff.find_similar(Some(&mut find_opts))
            .map_err(|e| VcsError::new(op, format!("failed to detect renames: {e}")))?;

        Ok(diff)
    }

    /// run the git binary in the working tree, returning trimmed stdout
    fn git(&self, operation: &str, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| VcsError::new(operation, format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut message = format!("git {} exited with {}", args.join(" "), output.status);
            if !stderr.trim().is_empty() {
                message = format!("{message}: {}", stderr.trim());
            }
            return Err(VcsError::new(operation, message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// commit id at the top of the stash, if there is a stash
    fn stash_top(&self) -> Result<Option<String>, VcsError> {
        match self.repo.refname_to_id("refs/stash") {
            Ok(oid) => Ok(Some(oid.to_string())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(VcsError::new("read stash", e.to_string())),
        }
    }

    fn merge_file(&self, name: &str) -> PathBuf {
        self.repo.path().join(name)
    }
}

/// map a git2 delta onto the classifier's change kinds
fn change_kind(delta: Delta) -> Option<ChangeKind> {
    match delta {
        Delta::Added => Some(ChangeKind::Added),
        Delta::Copied => Some(ChangeKind::Copied),
        Delta::Modified | Delta::Typechange => Some(ChangeKind::Modified),
        Delta::Renamed => Some(ChangeKind::Renamed),
        _ => None, // deleted, ignored, unmodified, etc.
    }
}

fn path_string(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().to_string())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, VcsError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VcsError::new(
            "read merge state",
            format!("failed to read {}: {e}", path.display()),
        )),
    }
}

impl VersionControl for GitRepo {
    fn staged_paths(&self, filter: ChangeFilter) -> Result<Vec<String>, VcsError> {
        let diff = self.staged_diff()?;
        let paths = diff
            .deltas()
            .filter(|delta| change_kind(delta.status()).is_some_and(|kind| filter.contains(kind)))
            .filter_map(|delta| path_string(delta.new_file().path()))
            .collect();
        Ok(paths)
    }

    fn staged_renames(&self) -> Result<Vec<Rename>, VcsError> {
        let diff = self.staged_diff()?;
        let renames = diff
            .deltas()
            .filter(|delta| delta.status() == Delta::Renamed)
            .filter_map(|delta| {
                Some(Rename {
                    old_path: path_string(delta.old_file().path())?,
                    new_path: path_string(delta.new_file().path())?,
                })
            })
            .collect();
        Ok(renames)
    }

    fn has_commits(&self) -> Result<bool, VcsError> {
        match self.repo.head() {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(false),
            Err(e) => Err(VcsError::new("read HEAD", e.to_string())),
        }
    }

    fn save_frame(&self, label: &str, keep_index: bool) -> Result<Option<Frame>, SaveFrameError> {
        let before = self.stash_top()?;

        let mut args = vec!["stash", "push", "--quiet"];
        if keep_index {
            args.push("--keep-index");
        }
        args.extend(["--message", label]);
        let pushed = self.git("create holding frame", &args);

        // `git stash push` succeeds without creating an entry when there's
        // nothing to hold, so compare the stash before and after. a push that
        // fails after recording the entry (e.g. while resetting the tree)
        // has still taken the changes away.
        let after = match (self.stash_top(), &pushed) {
            (Ok(after), _) => after,
            (Err(e), Ok(_)) => return Err(e.into()),
            (Err(_), Err(_)) => None,
        };
        let frame = match after {
            Some(id) if before.as_deref() != Some(id.as_str()) => Some(Frame {
                id,
                label: label.to_string(),
            }),
            _ => None,
        };

        match pushed {
            Ok(_) => Ok(frame),
            Err(error) => Err(SaveFrameError { error, held: frame }),
        }
    }

    fn apply_frame(&self, frame: &Frame) -> Result<(), VcsError> {
        self.git(
            "apply holding frame",
            &["stash", "apply", "--index", "--quiet", frame.id.as_str()],
        )?;
        Ok(())
    }

    fn drop_frame(&self, frame: &Frame) -> Result<(), VcsError> {
        // frames are addressed by commit id, but `stash drop` wants a position
        let listing = self.git("list holding frames", &["stash", "list", "--format=%H"])?;
        let position = listing
            .lines()
            .position(|id| id == frame.id)
            .ok_or_else(|| {
                VcsError::new(
                    "drop holding frame",
                    format!("stash entry {} not found", frame.id),
                )
            })?;
        let entry = format!("stash@{{{position}}}");
        self.git("drop holding frame", &["stash", "drop", "--quiet", entry.as_str()])?;
        Ok(())
    }

    fn held_frames(&self, labels: &[&str]) -> Result<Vec<Frame>, VcsError> {
        let listing = self.git("list holding frames", &["stash", "list", "--format=%H %s"])?;
        let frames = listing
            .lines()
            .filter_map(|line| {
                let (id, subject) = line.split_once(' ')?;
                // `stash push --message` records "On <branch>: <message>"
                let label = labels
                    .iter()
                    .find(|label| subject.ends_with(&format!(": {label}")))?;
                Some(Frame {
                    id: id.to_string(),
                    label: (*label).to_string(),
                })
            })
            .collect();
        Ok(frames)
    }

    fn read_merge_state(&self) -> Result<Option<MergeState>, VcsError> {
        let Some(head) = read_optional(&self.merge_file(MERGE_HEAD))? else {
            return Ok(None);
        };
        Ok(Some(MergeState {
            head,
            message: read_optional(&self.merge_file(MERGE_MSG))?,
            mode: read_optional(&self.merge_file(MERGE_MODE))?,
        }))
    }

    fn write_merge_state(&self, state: &MergeState) -> Result<(), VcsError> {
        let write = |name: &str, bytes: &[u8]| {
            let path = self.merge_file(name);
            fs::write(&path, bytes).map_err(|e| {
                VcsError::new(
                    "restore merge state",
                    format!("failed to write {}: {e}", path.display()),
                )
            })
        };

        if let Some(mode) = &state.mode {
            write(MERGE_MODE, mode)?;
        }
        write(MERGE_HEAD, &state.head)?;
        if let Some(message) = &state.message {
            write(MERGE_MSG, message)?;
        }
        Ok(())
    }
}
