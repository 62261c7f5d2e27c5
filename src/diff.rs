use crate::lint::ResultMapping;
use crate::report::RegressionReport;
use similar::TextDiff;
use std::collections::HashMap;

/// new path -> old path for renamed files
pub type RenameMap = HashMap<String, String>;

/// a delta block emitted for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelta {
    pub path: String,
    pub delta: String,
}

/// zero-context unified delta between two lint outputs
///
/// empty when the texts are equal
pub fn unified_delta(old_text: &str, new_text: &str, old_name: &str, new_name: &str) -> String {
    TextDiff::from_lines(old_text, new_text)
        .unified_diff()
        .context_radius(0)
        .header(old_name, new_name)
        .to_string()
}

/// append a delta block for every current result that differs from its baseline
///
/// the baseline entry is looked up under the old name for renamed paths; a
/// missing baseline counts as empty output. returns the emitted deltas in
/// `current` order.
pub fn diff_results(
    baseline: &ResultMapping,
    current: &ResultMapping,
    renames: &RenameMap,
    report: &mut RegressionReport,
) -> Vec<FileDelta> {
    let mut changed = Vec::new();

    for (new_name, result) in current.iter() {
        let old_name = renames.get(new_name).map_or(new_name, String::as_str);
        let old_text = match baseline.get(old_name) {
            Some(previous) if previous == result => continue,
            Some(previous) => previous.text(),
            None => "",
        };

        let delta = unified_delta(old_text, result.text(), old_name, new_name);
        if delta.is_empty() {
            continue;
        }
        report.push_block(&delta);
        changed.push(FileDelta {
            path: new_name.to_string(),
            delta,
        });
    }

    changed
}

/// report every added file whose linters flagged anything
///
/// added files have no baseline, so any finding is new. returns the paths reported.
pub fn report_added_files(added: &ResultMapping, report: &mut RegressionReport) -> Vec<String> {
    let mut reported = Vec::new();
    for (path, result) in added.iter() {
        if !result.has_warnings() {
            continue;
        }
        report.push_block(&format!("{path}\n{}", result.text()));
        report.flag_new_errors();
        reported.push(path.to_string());
    }
    reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defect::{PatternMatcher, detect_new_defects};
    use crate::lint::LintResult;

    fn mapping(entries: &[(&str, &str)]) -> ResultMapping {
        let mut mapping = ResultMapping::default();
        for (path, text) in entries {
            mapping.insert(*path, LintResult::new(*text, !text.is_empty()));
        }
        mapping
    }

    fn is_regression(report: &RegressionReport) -> bool {
        detect_new_defects(report.body(), &PatternMatcher::default())
    }

    #[test]
    fn test_equal_outputs_emit_nothing() {
        let baseline = mapping(&[("a.js", "a.js|E1|x\n")]);
        let current = mapping(&[("a.js", "a.js|E1|x\n")]);
        let mut report = RegressionReport::new();

        let changed = diff_results(&baseline, &current, &RenameMap::new(), &mut report);
        assert!(changed.is_empty());
        assert!(report.body().is_empty());
    }

    #[test]
    fn test_added_defect_line_is_a_regression() {
        let baseline = mapping(&[("a.js", "a.js|E1|x\n")]);
        let current = mapping(&[("a.js", "a.js|E1|x\na.js|E2|y\n")]);
        let mut report = RegressionReport::new();

        let changed = diff_results(&baseline, &current, &RenameMap::new(), &mut report);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].path, "a.js");
        assert_eq!(changed[0].delta, "--- a.js\n+++ a.js\n@@ -1,0 +2 @@\n+a.js|E2|y\n");
        assert!(report.body().contains("\n+a.js|E2|y\n"));
        assert!(!report.body().contains("E1"));
        assert!(is_regression(&report));
    }

    #[test]
    fn test_removed_defect_line_is_not_a_regression() {
        let baseline = mapping(&[("a.js", "a.js|E1|x\na.js|E2|y\n")]);
        let current = mapping(&[("a.js", "a.js|E1|x\n")]);
        let mut report = RegressionReport::new();

        diff_results(&baseline, &current, &RenameMap::new(), &mut report);
        assert!(report.body().contains("\n-a.js|E2|y\n"));
        assert!(!is_regression(&report));
    }

    #[test]
    fn test_block_is_a_zero_context_unified_diff() {
        let baseline = mapping(&[("a.js", "one|A|a\ntwo|B|b\nthree|C|c\n")]);
        let current = mapping(&[("a.js", "one|A|a\ntwo|B|changed\nthree|C|c\n")]);
        let mut report = RegressionReport::new();

        diff_results(&baseline, &current, &RenameMap::new(), &mut report);
        assert_eq!(
            report.body(),
            "\n\n\n--- a.js\n+++ a.js\n@@ -2 +2 @@\n-two|B|b\n+two|B|changed\n"
        );
    }

    #[test]
    fn test_unchanged_rename_emits_nothing() {
        let baseline = mapping(&[("old.js", "x|E1|y\n")]);
        let current = mapping(&[("new.js", "x|E1|y\n")]);
        let renames = RenameMap::from([("new.js".to_string(), "old.js".to_string())]);
        let mut report = RegressionReport::new();

        assert!(diff_results(&baseline, &current, &renames, &mut report).is_empty());
        assert!(report.body().is_empty());
    }

    #[test]
    fn test_changed_rename_names_both_sides() {
        let baseline = mapping(&[("old.js", "x|E1|y\n")]);
        let current = mapping(&[("new.js", "x|E1|y\nx|E2|z\n")]);
        let renames = RenameMap::from([("new.js".to_string(), "old.js".to_string())]);
        let mut report = RegressionReport::new();

        diff_results(&baseline, &current, &renames, &mut report);
        assert!(report.body().contains("--- old.js\n+++ new.js\n"));
    }

    #[test]
    fn test_missing_baseline_is_all_additions() {
        let baseline = ResultMapping::default();
        let current = mapping(&[("copy.js", "copy.js|E1|x\ncopy.js|E2|y\n")]);
        let mut report = RegressionReport::new();

        diff_results(&baseline, &current, &RenameMap::new(), &mut report);
        assert!(report.body().contains("+copy.js|E1|x\n+copy.js|E2|y\n"));
        assert!(is_regression(&report));
    }

    #[test]
    fn test_added_files_are_gated_on_warnings() {
        let mut added = ResultMapping::default();
        added.insert("clean.js", LintResult::new("", false));
        added.insert("dirty.js", LintResult::new("dirty.js|E1|bad\n", true));
        let mut report = RegressionReport::new();

        let reported = report_added_files(&added, &mut report);
        assert_eq!(reported, ["dirty.js"]);
        assert_eq!(report.body(), "\n\n\ndirty.js\ndirty.js|E1|bad\n");
        assert!(report.any_new_errors());
    }

    #[test]
    fn test_added_files_without_warnings_report_nothing() {
        let mut added = ResultMapping::default();
        added.insert("clean.js", LintResult::new("", false));
        let mut report = RegressionReport::new();

        assert!(report_added_files(&added, &mut report).is_empty());
        assert!(!report.any_new_errors());
        assert!(report.body().is_empty());
    }
}
