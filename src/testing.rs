//! in-memory collaborators for exercising the isolation sequence

use crate::constants::UNSTAGED_FRAME_LABEL;
use crate::lint::{LintError, LintResult, Linter};
use crate::vcs::{
    ChangeFilter, ChangeKind, Frame, MergeState, Rename, SaveFrameError, VcsError, VersionControl,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// what the fake working tree currently holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tree {
    /// staged and unstaged changes (the user's state)
    Full,
    /// only what will be committed
    Staged,
    /// the pre-commit baseline
    Baseline,
}

/// a repository that tracks which tree is checked out and which frames exist
pub struct FakeVcs {
    pub staged: Vec<(ChangeKind, String)>,
    pub renames: Vec<Rename>,
    pub commits: bool,
    pub tree: Cell<Tree>,
    pub frames: RefCell<Vec<Frame>>,
    pub merge: RefCell<Option<MergeState>>,
    pub calls: RefCell<Vec<String>>,
    /// frame labels whose reapply fails
    pub fail_apply: RefCell<Vec<String>>,
    /// make `save_frame` fail while the tree is in this state
    pub fail_save: Cell<Option<Tree>>,
    /// make `save_frame` record its frame while the tree is in this state,
    /// then fail anyway
    pub fail_after_save: Cell<Option<Tree>>,
    pub fail_query: bool,
    next_id: Cell<u32>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self {
            staged: Vec::new(),
            renames: Vec::new(),
            commits: true,
            tree: Cell::new(Tree::Full),
            frames: RefCell::new(Vec::new()),
            merge: RefCell::new(None),
            calls: RefCell::new(Vec::new()),
            fail_apply: RefCell::new(Vec::new()),
            fail_save: Cell::new(None),
            fail_after_save: Cell::new(None),
            fail_query: false,
            next_id: Cell::new(0),
        }
    }

    pub fn with_staged(mut self, kind: ChangeKind, path: &str) -> Self {
        self.staged.push((kind, path.to_string()));
        self
    }

    pub fn with_rename(mut self, old_path: &str, new_path: &str) -> Self {
        self.staged.push((ChangeKind::Renamed, new_path.to_string()));
        self.renames.push(Rename {
            old_path: old_path.to_string(),
            new_path: new_path.to_string(),
        });
        self
    }

    pub fn with_merge(self, state: MergeState) -> Self {
        *self.merge.borrow_mut() = Some(state);
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// true when the user's state is fully back in place
    pub fn is_restored(&self) -> bool {
        self.tree.get() == Tree::Full && self.frames.borrow().is_empty()
    }
}

pub fn merge_state() -> MergeState {
    MergeState {
        head: b"0123456789abcdef0123456789abcdef01234567\n".to_vec(),
        message: Some(b"Merge branch 'topic'\n".to_vec()),
        mode: Some(Vec::new()),
    }
}

impl VersionControl for FakeVcs {
    fn staged_paths(&self, filter: ChangeFilter) -> Result<Vec<String>, VcsError> {
        if self.fail_query {
            return Err(VcsError::new("diff staged changes", "git exploded"));
        }
        self.record(format!("staged_paths {filter:?}"));
        Ok(self
            .staged
            .iter()
            .filter(|(kind, _)| filter.contains(*kind))
            .map(|(_, path)| path.clone())
            .collect())
    }

    fn staged_renames(&self) -> Result<Vec<Rename>, VcsError> {
        self.record("staged_renames");
        Ok(self.renames.clone())
    }

    fn has_commits(&self) -> Result<bool, VcsError> {
        Ok(self.commits)
    }

    fn save_frame(&self, label: &str, keep_index: bool) -> Result<Option<Frame>, SaveFrameError> {
        self.record(format!("save {label}"));
        if self.fail_save.get() == Some(self.tree.get()) {
            return Err(VcsError::new("create holding frame", "stash refused").into());
        }
        let fail_after = self.fail_after_save.get() == Some(self.tree.get());
        let next = match (self.tree.get(), keep_index) {
            (Tree::Full, true) => Tree::Staged,
            (Tree::Staged, false) => Tree::Baseline,
            (tree, keep_index) => panic!("unexpected save from {tree:?} (keep_index {keep_index})"),
        };
        self.tree.set(next);
        // isolation resets the tree, which throws away merge bookkeeping
        *self.merge.borrow_mut() = None;

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let frame = Frame {
            id: format!("frame-{id}"),
            label: label.to_string(),
        };
        self.frames.borrow_mut().push(frame.clone());
        if fail_after {
            return Err(SaveFrameError {
                error: VcsError::new("create holding frame", "could not reset the index"),
                held: Some(frame),
            });
        }
        Ok(Some(frame))
    }

    fn apply_frame(&self, frame: &Frame) -> Result<(), VcsError> {
        self.record(format!("apply {}", frame.label));
        if self.fail_apply.borrow().contains(&frame.label) {
            return Err(VcsError::new("apply holding frame", "conflict"));
        }
        // the unstaged frame holds everything; the staged one is already contained in it
        if frame.label == UNSTAGED_FRAME_LABEL {
            self.tree.set(Tree::Full);
        }
        Ok(())
    }

    fn drop_frame(&self, frame: &Frame) -> Result<(), VcsError> {
        self.record(format!("drop {}", frame.label));
        self.frames.borrow_mut().retain(|f| f.id != frame.id);
        Ok(())
    }

    fn held_frames(&self, labels: &[&str]) -> Result<Vec<Frame>, VcsError> {
        Ok(self
            .frames
            .borrow()
            .iter()
            .rev()
            .filter(|f| labels.contains(&f.label.as_str()))
            .cloned()
            .collect())
    }

    fn read_merge_state(&self) -> Result<Option<MergeState>, VcsError> {
        self.record("read merge state");
        Ok(self.merge.borrow().clone())
    }

    fn write_merge_state(&self, state: &MergeState) -> Result<(), VcsError> {
        self.record("write merge state");
        *self.merge.borrow_mut() = Some(state.clone());
        Ok(())
    }
}

/// a linter whose output depends on which tree the fake repository holds
pub struct TreeLinter<'a> {
    vcs: &'a FakeVcs,
    outputs: HashMap<(Tree, String), LintResult>,
    crashes: Vec<(Tree, String)>,
    fatal_in: Option<Tree>,
    pub linted: RefCell<Vec<(Tree, String)>>,
}

impl<'a> TreeLinter<'a> {
    pub fn new(vcs: &'a FakeVcs) -> Self {
        Self {
            vcs,
            outputs: HashMap::new(),
            crashes: Vec::new(),
            fatal_in: None,
            linted: RefCell::new(Vec::new()),
        }
    }

    /// lint output for `path` while `tree` is checked out; a warning flag is
    /// derived from whether there's any output
    pub fn output(mut self, tree: Tree, path: &str, text: &str) -> Self {
        self.outputs.insert(
            (tree, path.to_string()),
            LintResult::new(text, !text.is_empty()),
        );
        self
    }

    pub fn crash(mut self, tree: Tree, path: &str) -> Self {
        self.crashes.push((tree, path.to_string()));
        self
    }

    /// fail every lint in `tree` with an error that can't be confined to a file
    pub fn fatal_in(mut self, tree: Tree) -> Self {
        self.fatal_in = Some(tree);
        self
    }
}

impl Linter for TreeLinter<'_> {
    fn lint(&self, path: &str, _mode: Option<&str>) -> Result<Option<LintResult>, LintError> {
        let tree = self.vcs.tree.get();
        self.linted.borrow_mut().push((tree, path.to_string()));
        if self.fatal_in == Some(tree) {
            return Err(LintError::Config("linter configuration vanished".to_string()));
        }
        if self.crashes.contains(&(tree, path.to_string())) {
            return Err(LintError::Crash {
                linter: "fake".to_string(),
                path: path.to_string(),
                message: "segfault".to_string(),
            });
        }
        Ok(self.outputs.get(&(tree, path.to_string())).cloned())
    }

    fn handles(&self, path: &str, _mode: Option<&str>) -> bool {
        path.ends_with(".js")
    }
}
