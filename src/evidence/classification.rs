//! Work type classification based on labels and title heuristics (C5).

use std::sync::OnceLock;

use regex::Regex;

use super::models::WorkType;

/// Configurable label and title-pattern rules for work type
/// classification. Values mirror the defaults an estate would
/// otherwise need to override explicitly.
#[derive(Debug, Clone)]
pub struct ClassificationConfig {
    pub feature_labels: Vec<String>,
    pub bug_labels: Vec<String>,
    pub refactor_labels: Vec<String>,
    pub chore_labels: Vec<String>,
    pub documentation_labels: Vec<String>,
    pub feature_title_patterns: Vec<String>,
    pub bug_title_patterns: Vec<String>,
    pub refactor_title_patterns: Vec<String>,
    pub chore_title_patterns: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            feature_labels: strs(&["feature", "enhancement", "new feature", "feat"]),
            bug_labels: strs(&["bug", "bugfix", "fix", "defect", "hotfix"]),
            refactor_labels: strs(&["refactor", "refactoring", "tech debt", "technical debt", "cleanup"]),
            chore_labels: strs(&["chore", "maintenance", "dependencies", "deps", "ci", "build"]),
            documentation_labels: strs(&["documentation", "docs", "doc"]),
            feature_title_patterns: strs(&[r"^feat(\(.+\))?:", r"^add\s", r"^implement\s", r"^introduce\s"]),
            bug_title_patterns: strs(&[
                r"^fix(\(.+\))?:",
                r"^bugfix:",
                r"^hotfix:",
                r"(?:[^a-zA-Z-]|^)fix(es|ed)?(?:[^a-zA-Z]|$)",
            ]),
            refactor_title_patterns: strs(&[r"^refactor(\(.+\))?:", r"\brefactor\b", r"\bcleanup\b"]),
            chore_title_patterns: strs(&[
                r"^chore(\(.+\))?:",
                r"^ci(\(.+\))?:",
                r"^build(\(.+\))?:",
                r"\bdependenc(y|ies)\b",
                r"\bbump\b",
                r"^update\s+.*dependenc",
            ]),
        }
    }
}

fn strs(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_config() -> &'static ClassificationConfig {
    static CONFIG: OnceLock<ClassificationConfig> = OnceLock::new();
    CONFIG.get_or_init(ClassificationConfig::default)
}

fn normalise_label(label: &str) -> String {
    label.trim().to_lowercase()
}

fn labels_match(labels: &[String], patterns: &[String]) -> bool {
    let normalised: Vec<String> = patterns.iter().map(|p| normalise_label(p)).collect();
    labels.iter().any(|label| normalised.contains(&normalise_label(label)))
}

fn compiled(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("(?i){pattern}")).ok()
}

fn title_matches(title: Option<&str>, patterns: &[String]) -> bool {
    let Some(title) = title else { return false };
    let lowered = title.to_lowercase();
    patterns
        .iter()
        .filter_map(|p| compiled(p))
        .any(|re| re.is_match(&lowered))
}

fn matches_prefix_pattern(title: &str, patterns: &[String]) -> bool {
    let lowered = title.to_lowercase();
    patterns
        .iter()
        .filter(|p| p.starts_with('^'))
        .filter_map(|p| compiled(p))
        .any(|re| re.is_match(&lowered))
}

/// Classify by labels, label resolution order bug > feature > refactor
/// > documentation > chore.
pub fn classify_by_labels(labels: &[String], config: &ClassificationConfig) -> Option<WorkType> {
    if labels_match(labels, &config.bug_labels) {
        return Some(WorkType::Bug);
    }
    if labels_match(labels, &config.feature_labels) {
        return Some(WorkType::Feature);
    }
    if labels_match(labels, &config.refactor_labels) {
        return Some(WorkType::Refactor);
    }
    if labels_match(labels, &config.documentation_labels) {
        return Some(WorkType::Documentation);
    }
    if labels_match(labels, &config.chore_labels) {
        return Some(WorkType::Chore);
    }
    None
}

/// Classify by title: conventional-commit prefixes first (bug > chore
/// > feature > refactor, so "ci: fix X" is chore not bug), then
/// general word-boundary patterns (bug > feature > refactor > chore).
pub fn classify_by_title(title: Option<&str>, config: &ClassificationConfig) -> Option<WorkType> {
    let title = title?;

    let prefix_order: [(&[String], WorkType); 4] = [
        (&config.bug_title_patterns, WorkType::Bug),
        (&config.chore_title_patterns, WorkType::Chore),
        (&config.feature_title_patterns, WorkType::Feature),
        (&config.refactor_title_patterns, WorkType::Refactor),
    ];
    for (patterns, work_type) in prefix_order {
        if matches_prefix_pattern(title, patterns) {
            return Some(work_type);
        }
    }

    let general_order: [(&[String], WorkType); 4] = [
        (&config.bug_title_patterns, WorkType::Bug),
        (&config.feature_title_patterns, WorkType::Feature),
        (&config.refactor_title_patterns, WorkType::Refactor),
        (&config.chore_title_patterns, WorkType::Chore),
    ];
    for (patterns, work_type) in general_order {
        if title_matches(Some(title), patterns) {
            return Some(work_type);
        }
    }
    None
}

/// Classify a pull request: labels take precedence over title.
pub fn classify_pull_request(labels: &[String], title: Option<&str>, config: &ClassificationConfig) -> WorkType {
    classify_by_labels(labels, config)
        .or_else(|| classify_by_title(title, config))
        .unwrap_or(WorkType::Unknown)
}

/// Classify an issue: labels take precedence over title.
pub fn classify_issue(labels: &[String], title: Option<&str>, config: &ClassificationConfig) -> WorkType {
    classify_by_labels(labels, config)
        .or_else(|| classify_by_title(title, config))
        .unwrap_or(WorkType::Unknown)
}

/// Classify a commit by its message only (no label surface on commits).
pub fn classify_commit(message: Option<&str>, config: &ClassificationConfig) -> WorkType {
    classify_by_title(message, config).unwrap_or(WorkType::Unknown)
}

pub fn is_merge_commit(message: Option<&str>) -> bool {
    let Some(message) = message else { return false };
    let lowered = message.to_lowercase();
    lowered.starts_with("merge ") || lowered.starts_with("merge pull request")
}

/// Classify using the shared default rule set.
pub fn classify_commit_default(message: Option<&str>) -> WorkType {
    classify_commit(message, default_config())
}
pub fn classify_pull_request_default(labels: &[String], title: Option<&str>) -> WorkType {
    classify_pull_request(labels, title, default_config())
}
pub fn classify_issue_default(labels: &[String], title: Option<&str>) -> WorkType {
    classify_issue(labels, title, default_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bug_label_beats_feature_label() {
        let config = ClassificationConfig::default();
        let result = classify_by_labels(&labels(&["feature", "bug"]), &config);
        assert_eq!(result, Some(WorkType::Bug));
    }

    #[test]
    fn ci_fix_title_classifies_as_chore_not_bug() {
        let config = ClassificationConfig::default();
        let result = classify_by_title(Some("ci: fix flaky test"), &config);
        assert_eq!(result, Some(WorkType::Chore));
    }

    #[test]
    fn conventional_feat_prefix_classifies_as_feature() {
        let config = ClassificationConfig::default();
        let result = classify_by_title(Some("feat(auth): add SSO support"), &config);
        assert_eq!(result, Some(WorkType::Feature));
    }

    #[test]
    fn general_fix_word_boundary_classifies_as_bug() {
        let config = ClassificationConfig::default();
        let result = classify_by_title(Some("fixes a crash on startup"), &config);
        assert_eq!(result, Some(WorkType::Bug));
    }

    #[test]
    fn hyphenated_fix_does_not_match_standalone_word_pattern() {
        let config = ClassificationConfig::default();
        assert!(!title_matches(Some("re-fixing the thing"), &config.bug_title_patterns));
        assert!(title_matches(Some("fixes a crash"), &config.bug_title_patterns));
    }

    #[test]
    fn commit_without_title_signal_is_unknown() {
        assert_eq!(classify_commit(None, &ClassificationConfig::default()), WorkType::Unknown);
    }

    #[test]
    fn labels_take_precedence_over_title_for_issues() {
        let config = ClassificationConfig::default();
        let result = classify_issue(&labels(&["documentation"]), Some("fix: typo"), &config);
        assert_eq!(result, WorkType::Documentation);
    }

    #[test]
    fn merge_commit_detection_is_case_insensitive_prefix() {
        assert!(is_merge_commit(Some("Merge pull request #42 from x/y")));
        assert!(is_merge_commit(Some("merge branch 'main'")));
        assert!(!is_merge_commit(Some("merge-related cleanup")));
    }
}
