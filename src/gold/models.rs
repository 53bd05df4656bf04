//! Report, coverage, and review-marker value objects (§3 Gold entities).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evidence::ReportStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    Repository,
    Project,
    Estate,
}

impl ReportScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportScope::Repository => "repository",
            ReportScope::Project => "project",
            ReportScope::Estate => "estate",
        }
    }
}

/// The structured record a status model returns, validated before a
/// report is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSummary {
    pub status: String,
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl MachineSummary {
    pub fn status(&self) -> ReportStatus {
        ReportStatus::parse(Some(&self.status))
    }
}

#[derive(Debug, Error)]
#[error("report window invalid: end ({window_end}) must be after start ({window_start})")]
pub struct InvalidWindowError {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Error)]
#[error("report scope {scope:?} requires its corresponding id to be set")]
pub struct MissingScopeIdError {
    pub scope: ReportScope,
}

#[derive(Debug, Error)]
pub enum ReportConstructionError {
    #[error(transparent)]
    InvalidWindow(#[from] InvalidWindowError),
    #[error(transparent)]
    MissingScopeId(#[from] MissingScopeIdError),
}

/// Persisted output of the reporting orchestrator (C7). Constructed
/// only through [`Report::new`], which enforces `window_end >
/// window_start` and the scope/id correspondence.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: String,
    pub scope: ReportScope,
    pub repository_id: Option<String>,
    pub project_id: Option<String>,
    pub estate_id: Option<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub model_identifier: String,
    pub human_text: Option<String>,
    pub machine_summary: MachineSummary,
    pub latency_ms: Option<i64>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
}

#[allow(clippy::too_many_arguments)]
impl Report {
    pub fn new(
        id: String,
        scope: ReportScope,
        repository_id: Option<String>,
        project_id: Option<String>,
        estate_id: Option<String>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        generated_at: DateTime<Utc>,
        model_identifier: String,
        human_text: Option<String>,
        machine_summary: MachineSummary,
        latency_ms: Option<i64>,
        prompt_tokens: Option<i64>,
        completion_tokens: Option<i64>,
        total_tokens: Option<i64>,
    ) -> Result<Self, ReportConstructionError> {
        if window_end <= window_start {
            return Err(InvalidWindowError {
                window_start,
                window_end,
            }
            .into());
        }
        match scope {
            ReportScope::Repository if repository_id.is_none() => {
                return Err(MissingScopeIdError { scope }.into())
            }
            ReportScope::Project if project_id.is_none() => return Err(MissingScopeIdError { scope }.into()),
            ReportScope::Estate if estate_id.is_none() => return Err(MissingScopeIdError { scope }.into()),
            _ => {}
        }
        Ok(Self {
            id,
            scope,
            repository_id,
            project_id,
            estate_id,
            window_start,
            window_end,
            generated_at,
            model_identifier,
            human_text,
            machine_summary,
            latency_ms,
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }
}

/// `(report_id, event_fact_id)` provenance mapping, unique per pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportCoverage {
    pub report_id: String,
    pub event_fact_id: i64,
}

/// Join row linking a project-scope report to the catalogue project it
/// reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportProject {
    pub id: String,
    pub key: String,
    pub estate_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Pending,
    Resolved,
    Dismissed,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Pending => "pending",
            ReviewState::Resolved => "resolved",
            ReviewState::Dismissed => "dismissed",
        }
    }
}

/// Human-review marker for a report that exhausted its validation
/// retries. At most one pending marker may exist per
/// `(repository_id, window_start, window_end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportReview {
    pub id: String,
    pub repository_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub state: ReviewState,
    pub attempt_count: u32,
    pub issues: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary() -> MachineSummary {
        MachineSummary {
            status: "on_track".to_string(),
            summary: "all good".to_string(),
            highlights: vec![],
            risks: vec![],
            next_steps: vec![],
        }
    }

    #[test]
    fn rejects_an_inverted_window() {
        let start = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = Report::new(
            "r1".to_string(),
            ReportScope::Repository,
            Some("repo-1".to_string()),
            None,
            None,
            start,
            end,
            end,
            "ghillie-status-v1".to_string(),
            None,
            summary(),
            None,
            None,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn repository_scope_requires_repository_id() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
        let result = Report::new(
            "r1".to_string(),
            ReportScope::Repository,
            None,
            None,
            None,
            start,
            end,
            end,
            "ghillie-status-v1".to_string(),
            None,
            summary(),
            None,
            None,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn valid_repository_report_constructs() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
        let result = Report::new(
            "r1".to_string(),
            ReportScope::Repository,
            Some("repo-1".to_string()),
            None,
            None,
            start,
            end,
            end,
            "ghillie-status-v1".to_string(),
            Some("summary text".to_string()),
            summary(),
            Some(120),
            Some(400),
            Some(80),
            Some(480),
        );
        assert!(result.is_ok());
    }
}
