//! Markdown renderer for repository status reports.
//!
//! Renders from [`Report::machine_summary`] rather than `human_text`,
//! guaranteeing that the rendered document matches the persisted
//! record exactly.

use chrono::{DateTime, Utc};

use crate::gold::Report;

fn status_label(status: &str) -> &str {
    match status {
        "on_track" => "On Track",
        "at_risk" => "At Risk",
        "blocked" => "Blocked",
        "unknown" => "Unknown",
        other => other,
    }
}

fn format_date(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn format_generated_at(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Render a persisted report as a structured Markdown document.
pub fn render_report_markdown(report: &Report, owner: &str, name: &str) -> String {
    let ms = &report.machine_summary;
    let mut lines: Vec<String> = Vec::new();

    let window_start_str = format_date(report.window_start);
    let window_end_str = format_date(report.window_end);

    lines.push(format!(
        "# {owner}/{name} — Status report ({window_start_str} to {window_end_str})"
    ));
    lines.push(String::new());

    lines.push(format!("**Status:** {}", status_label(&ms.status)));
    lines.push(String::new());

    if !ms.summary.is_empty() {
        lines.push("## Summary".to_string());
        lines.push(String::new());
        lines.push(ms.summary.clone());
        lines.push(String::new());
    }

    if !ms.highlights.is_empty() {
        lines.push("## Highlights".to_string());
        lines.push(String::new());
        lines.extend(ms.highlights.iter().map(|item| format!("- {item}")));
        lines.push(String::new());
    }

    if !ms.risks.is_empty() {
        lines.push("## Risks".to_string());
        lines.push(String::new());
        lines.extend(ms.risks.iter().map(|item| format!("- {item}")));
        lines.push(String::new());
    }

    if !ms.next_steps.is_empty() {
        lines.push("## Next steps".to_string());
        lines.push(String::new());
        lines.extend(ms.next_steps.iter().map(|item| format!("- {item}")));
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(format!(
        "*Generated at {} by {} | Window: {} to {} | Report ID: {}*",
        format_generated_at(report.generated_at),
        report.model_identifier,
        window_start_str,
        window_end_str,
        report.id
    ));
    lines.push(String::new());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gold::{MachineSummary, ReportScope};
    use chrono::TimeZone;

    fn sample_report() -> Report {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
        Report::new(
            "report-1".to_string(),
            ReportScope::Repository,
            Some("repo-1".to_string()),
            None,
            None,
            start,
            end,
            Utc.with_ymd_and_hms(2026, 1, 8, 12, 30, 0).unwrap(),
            "ghillie-status-v1".to_string(),
            None,
            MachineSummary {
                status: "at_risk".to_string(),
                summary: "Two features shipped, one risk identified.".to_string(),
                highlights: vec!["Shipped search v2".to_string()],
                risks: vec!["CI flaky on integration suite".to_string()],
                next_steps: vec![],
            },
            Some(850),
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn renders_title_status_and_footer() {
        let markdown = render_report_markdown(&sample_report(), "acme", "widget");
        assert!(markdown.starts_with("# acme/widget — Status report (2026-01-01 to 2026-01-08)"));
        assert!(markdown.contains("**Status:** At Risk"));
        assert!(markdown.contains("Report ID: report-1"));
        assert!(markdown.contains("Generated at 2026-01-08 12:30 UTC by ghillie-status-v1"));
    }

    #[test]
    fn omits_sections_with_empty_source_lists() {
        let markdown = render_report_markdown(&sample_report(), "acme", "widget");
        assert!(!markdown.contains("## Next steps"));
    }

    #[test]
    fn highlight_and_risk_bullets_are_rendered() {
        let markdown = render_report_markdown(&sample_report(), "acme", "widget");
        assert!(markdown.contains("## Highlights"));
        assert!(markdown.contains("- Shipped search v2"));
        assert!(markdown.contains("## Risks"));
        assert!(markdown.contains("- CI flaky on integration suite"));
    }
}
