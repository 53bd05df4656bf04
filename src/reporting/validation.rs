//! Validation rules applied to a status model's raw [`StatusResult`]
//! before it is accepted as a report's machine summary.

use super::status::StatusResult;

const VALID_STATUSES: [&str; 4] = ["on_track", "at_risk", "blocked", "unknown"];

/// Checks a [`StatusResult`] against the acceptance rules a generated
/// report must satisfy. Returns the list of issues found; an empty
/// list means the result is acceptable.
pub fn validate(result: &StatusResult) -> Vec<String> {
    let mut issues = Vec::new();

    if result.summary.trim().is_empty() {
        issues.push("summary must not be empty".to_string());
    }
    if !VALID_STATUSES.contains(&result.status.to_lowercase().as_str()) {
        issues.push(format!("status '{}' is not a recognised value", result.status));
    }
    check_non_empty_strings(&result.highlights, "highlights", &mut issues);
    check_non_empty_strings(&result.risks, "risks", &mut issues);
    check_non_empty_strings(&result.next_steps, "next_steps", &mut issues);

    issues
}

fn check_non_empty_strings(items: &[String], field: &str, issues: &mut Vec<String>) {
    if items.iter().any(|item| item.trim().is_empty()) {
        issues.push(format!("{field} must not contain empty entries"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_result() -> StatusResult {
        StatusResult {
            status: "on_track".to_string(),
            summary: "shipped two features".to_string(),
            highlights: vec!["launched search".to_string()],
            risks: vec![],
            next_steps: vec!["monitor rollout".to_string()],
        }
    }

    #[test]
    fn accepts_a_well_formed_result() {
        assert!(validate(&valid_result()).is_empty());
    }

    #[test]
    fn rejects_empty_summary() {
        let mut result = valid_result();
        result.summary = "   ".to_string();
        let issues = validate(&result);
        assert!(issues.iter().any(|i| i.contains("summary")));
    }

    #[test]
    fn rejects_unknown_status() {
        let mut result = valid_result();
        result.status = "stalled".to_string();
        let issues = validate(&result);
        assert!(issues.iter().any(|i| i.contains("status")));
    }

    #[test]
    fn rejects_blank_highlight_entries() {
        let mut result = valid_result();
        result.highlights.push("  ".to_string());
        let issues = validate(&result);
        assert!(issues.iter().any(|i| i.contains("highlights")));
    }

    #[test]
    fn status_comparison_is_case_insensitive() {
        let mut result = valid_result();
        result.status = "On_Track".to_string();
        assert!(validate(&result).is_empty());
    }
}
