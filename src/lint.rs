use thiserror::Error;

/// output of linting one file
#[derive(Clone, Debug, Default)]
pub struct LintResult {
    text: String,
    has_warnings: bool,
}

impl LintResult {
    pub fn new(text: impl Into<String>, has_warnings: bool) -> Self {
        Self {
            text: text.into(),
            has_warnings,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// whether any linter signalled findings through its exit status
    pub fn has_warnings(&self) -> bool {
        self.has_warnings
    }

    /// fold another linter's output for the same file into this one
    pub fn merge(&mut self, other: LintResult) {
        self.text.push_str(&other.text);
        self.has_warnings |= other.has_warnings;
    }
}

// the warning flag is derived from the text's producer, not part of identity
impl PartialEq for LintResult {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for LintResult {}

/// path -> lint result, iterated in insertion (classification) order
#[derive(Clone, Debug, Default)]
pub struct ResultMapping {
    entries: Vec<(String, LintResult)>,
}

impl ResultMapping {
    /// insert or replace; a replaced entry keeps its original position
    pub fn insert(&mut self, path: impl Into<String>, result: LintResult) {
        let path = path.into();
        if let Some(slot) = self.entries.iter_mut().find(|(p, _)| *p == path) {
            slot.1 = result;
        } else {
            self.entries.push((path, result));
        }
    }

    pub fn get(&self, path: &str) -> Option<&LintResult> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, result)| result)
    }

    pub fn remove(&mut self, path: &str) -> Option<LintResult> {
        let pos = self.entries.iter().position(|(p, _)| p == path)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LintResult)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), r))
    }
}

#[derive(Debug, Error)]
pub enum LintError {
    /// the linter failed for a reason other than reporting findings
    #[error("{linter} crashed on {path}: {message}")]
    Crash {
        linter: String,
        path: String,
        message: String,
    },

    /// the linter set itself is unusable (unknown linter, bad command)
    #[error("{0}")]
    Config(String),
}

impl LintError {
    /// crashes can be confined to the file being linted
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Crash { .. })
    }
}

/// the linting capability consumed by the regression engine
pub trait Linter {
    /// lint `path` (relative to the repository root)
    ///
    /// `mode` picks a dialect when several languages claim the extension.
    /// returns `None` when no linter handles the file.
    fn lint(&self, path: &str, mode: Option<&str>) -> Result<Option<LintResult>, LintError>;

    /// whether `lint` would run anything for `path`
    fn handles(&self, _path: &str, _mode: Option<&str>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_warning_flag() {
        assert_eq!(
            LintResult::new("a.js|E1|x\n", true),
            LintResult::new("a.js|E1|x\n", false)
        );
        assert_ne!(LintResult::new("a", false), LintResult::new("b", false));
    }

    #[test]
    fn test_merge_concatenates_and_ors_warnings() {
        let mut result = LintResult::new("one\n", false);
        result.merge(LintResult::new("two\n", true));
        assert_eq!(result.text(), "one\ntwo\n");
        assert!(result.has_warnings());
    }

    #[test]
    fn test_mapping_keeps_classification_order() {
        let mut mapping = ResultMapping::default();
        mapping.insert("z.js", LintResult::default());
        mapping.insert("a.js", LintResult::default());
        mapping.insert("z.js", LintResult::new("again", false));

        let paths: Vec<&str> = mapping.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, ["z.js", "a.js"]);
        assert_eq!(mapping.get("z.js").map(LintResult::text), Some("again"));

        assert!(mapping.remove("z.js").is_some());
        assert_eq!(mapping.iter().count(), 1);
    }
}
