use crate::vcs::{ChangeFilter, Rename, VcsError, VersionControl};

/// compared against a baseline under the same name
const MODIFIED_OR_COPIED: &str = "CM";
/// reported directly
const ADDED: &str = "A";

/// the staged changes of one commit, split by how they're compared
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StagedFileSet {
    /// copied or modified: linted before and after under the same name
    pub modified_or_copied: Vec<String>,
    /// added: no baseline, reported directly
    pub added: Vec<String>,
    /// renamed: linted under the new name now and the old name before
    pub renames: Vec<Rename>,
}

impl StagedFileSet {
    /// query the staging area and split it into the three sets
    pub fn classify(vcs: &impl VersionControl) -> Result<Self, VcsError> {
        let modified_or_copied = vcs.staged_paths(ChangeFilter::from_codes(MODIFIED_OR_COPIED)?)?;
        let mut added = vcs.staged_paths(ChangeFilter::from_codes(ADDED)?)?;
        let mut renames = vcs.staged_renames()?;

        // a path only ever plays one "new name" role
        renames.retain(|r| !modified_or_copied.contains(&r.new_path));
        added.retain(|p| {
            !modified_or_copied.contains(p) && !renames.iter().any(|r| &r.new_path == p)
        });

        Ok(Self {
            modified_or_copied,
            added,
            renames,
        })
    }

    /// old name for a renamed path, falling back to the path itself
    pub fn baseline_name<'a>(&'a self, new_path: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|r| r.new_path == new_path)
            .map_or(new_path, |r| r.old_path.as_str())
    }

    /// every path that exists in the commit being made
    pub fn current_paths(&self) -> impl Iterator<Item = &str> {
        self.modified_or_copied
            .iter()
            .chain(self.added.iter())
            .map(String::as_str)
            .chain(self.renames.iter().map(|r| r.new_path.as_str()))
    }

    /// every path a linter will be run on, in either tree
    ///
    /// renamed files are linted under their old name for the baseline, and
    /// that name may map to a different language
    pub fn lint_paths(&self) -> impl Iterator<Item = &str> {
        self.current_paths()
            .chain(self.renames.iter().map(|r| r.old_path.as_str()))
    }

    pub fn len(&self) -> usize {
        self.modified_or_copied.len() + self.added.len() + self.renames.len()
    }
}
