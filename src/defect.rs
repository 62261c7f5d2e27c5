use regex::Regex;
use std::sync::LazyLock;

/// `subject|code|description`, not starting with the removal marker.
/// the subject may be empty (a `+` marker alone is enough), code and
/// description may not. unmarked header lines of the same shape also match;
/// a false positive is preferred over approving a regression.
pub const PIPE_RECORD_PATTERN: &str = r"^[^\-].*\|.+\|.+";

static PIPE_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(PIPE_RECORD_PATTERN).unwrap_or_else(|e| panic!("invalid built-in pattern: {e}"))
});

/// decides whether a line of the accumulated report is a newly introduced defect
pub trait DefectMatcher {
    fn is_new_defect(&self, line: &str) -> bool;
}

impl<F: Fn(&str) -> bool> DefectMatcher for F {
    fn is_new_defect(&self, line: &str) -> bool {
        self(line)
    }
}

/// regex-backed matcher; the default matches three-field pipe records
#[derive(Clone, Debug)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self {
            regex: PIPE_RECORD.clone(),
        }
    }
}

impl DefectMatcher for PatternMatcher {
    fn is_new_defect(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// true if any line of `report` is a newly introduced defect
pub fn detect_new_defects(report: &str, matcher: &dyn DefectMatcher) -> bool {
    report.split('\n').any(|line| matcher.is_new_defect(line))
}
