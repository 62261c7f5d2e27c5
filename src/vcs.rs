//! The version-control surface the regression engine depends on.
//!
//! Four primitives: staged path queries, staged rename pairs, holding frames
//! for uncommitted changes, and merge-in-progress bookkeeping. `GitRepo` in
//! `git.rs` is the production implementation; tests substitute in-memory fakes.

use thiserror::Error;

/// a staged change type, as understood by the classifier's filter vocabulary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Copied,
    Modified,
    Renamed,
}

impl ChangeKind {
    fn bit(self) -> u8 {
        match self {
            Self::Added => 1,
            Self::Copied => 2,
            Self::Modified => 4,
            Self::Renamed => 8,
        }
    }
}

/// a union of change kinds (never an intersection)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeFilter(u8);

impl ChangeFilter {
    pub fn of(kinds: &[ChangeKind]) -> Self {
        Self(kinds.iter().fold(0, |acc, kind| acc | kind.bit()))
    }

    /// parse a code string such as "CM"; unknown codes are rejected
    pub fn from_codes(codes: &str) -> Result<Self, VcsError> {
        let mut kinds = Vec::new();
        for code in codes.chars() {
            let kind = match code.to_ascii_uppercase() {
                'A' => ChangeKind::Added,
                'C' => ChangeKind::Copied,
                'M' => ChangeKind::Modified,
                'R' => ChangeKind::Renamed,
                other => {
                    return Err(VcsError::new(
                        "change filter",
                        format!("unknown change code '{other}'"),
                    ));
                }
            };
            kinds.push(kind);
        }
        Ok(Self::of(&kinds))
    }

    pub fn contains(self, kind: ChangeKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

/// a staged rename as reported by the version-control tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rename {
    pub old_path: String,
    pub new_path: String,
}

/// a holding frame created by `save_frame`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// stable identifier of the frame (a stash commit id for git)
    pub id: String,
    pub label: String,
}

/// merge bookkeeping captured before isolation, stored as raw bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeState {
    pub head: Vec<u8>,
    pub message: Option<Vec<u8>>,
    pub mode: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct VcsError {
    pub operation: String,
    pub message: String,
}

impl VcsError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// a failed `save_frame`
///
/// `held` is set when the frame was recorded before the failure, so the
/// changes it holds are no longer in the working tree
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SaveFrameError {
    pub error: VcsError,
    pub held: Option<Frame>,
}

impl From<VcsError> for SaveFrameError {
    fn from(error: VcsError) -> Self {
        Self { error, held: None }
    }
}

pub trait VersionControl {
    /// staged paths whose change kind is in `filter`, renames detected
    fn staged_paths(&self, filter: ChangeFilter) -> Result<Vec<String>, VcsError>;

    /// staged renames, in the order the tool reports them
    fn staged_renames(&self) -> Result<Vec<Rename>, VcsError>;

    /// false for a repository without a first commit (no baseline exists)
    fn has_commits(&self) -> Result<bool, VcsError>;

    /// move uncommitted changes into a holding frame
    ///
    /// with `keep_index` the staged changes stay applied to the working tree.
    /// returns `None` when there was nothing to hold.
    fn save_frame(&self, label: &str, keep_index: bool) -> Result<Option<Frame>, SaveFrameError>;

    /// reapply a frame, restoring both the working tree and the index
    fn apply_frame(&self, frame: &Frame) -> Result<(), VcsError>;

    fn drop_frame(&self, frame: &Frame) -> Result<(), VcsError>;

    /// frames carrying one of `labels` that still exist, newest first
    fn held_frames(&self, labels: &[&str]) -> Result<Vec<Frame>, VcsError>;

    fn read_merge_state(&self) -> Result<Option<MergeState>, VcsError>;

    fn write_merge_state(&self, state: &MergeState) -> Result<(), VcsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_a_union() {
        let filter = ChangeFilter::from_codes("CM").unwrap();
        assert!(filter.contains(ChangeKind::Copied));
        assert!(filter.contains(ChangeKind::Modified));
        assert!(!filter.contains(ChangeKind::Added));
        assert!(!filter.contains(ChangeKind::Renamed));
    }

    #[test]
    fn test_filter_codes_are_case_insensitive() {
        let filter = ChangeFilter::from_codes("ar").unwrap();
        assert_eq!(filter, ChangeFilter::of(&[ChangeKind::Added, ChangeKind::Renamed]));
    }

    #[test]
    fn test_filter_rejects_unknown_codes() {
        let err = ChangeFilter::from_codes("MD").unwrap_err();
        assert!(err.message.contains("'D'"));
    }
}
