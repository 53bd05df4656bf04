//! Evidence bundle DTOs shared by the repository-scope (C5) and
//! project-scope (C6) assemblers.

use chrono::{DateTime, Utc};

/// Work type classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkType {
    Feature,
    Bug,
    Refactor,
    Chore,
    Documentation,
    Unknown,
}

impl WorkType {
    pub const ALL: [WorkType; 6] = [
        WorkType::Feature,
        WorkType::Bug,
        WorkType::Refactor,
        WorkType::Chore,
        WorkType::Documentation,
        WorkType::Unknown,
    ];
}

/// Parsed `machine_summary.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportStatus {
    OnTrack,
    AtRisk,
    Blocked,
    #[default]
    Unknown,
}

impl ReportStatus {
    /// Parse case-insensitively; `None`, unknown strings, or
    /// non-string values all map to [`ReportStatus::Unknown`].
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|s| s.to_lowercase()).as_deref() {
            Some("on_track") => ReportStatus::OnTrack,
            Some("at_risk") => ReportStatus::AtRisk,
            Some("blocked") => ReportStatus::Blocked,
            _ => ReportStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::OnTrack => "on_track",
            ReportStatus::AtRisk => "at_risk",
            ReportStatus::Blocked => "blocked",
            ReportStatus::Unknown => "unknown",
        }
    }

    pub fn human_label(&self) -> &'static str {
        match self {
            ReportStatus::OnTrack => "On Track",
            ReportStatus::AtRisk => "At Risk",
            ReportStatus::Blocked => "Blocked",
            ReportStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvidence {
    pub sha: String,
    pub message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub committed_at: DateTime<Utc>,
    pub work_type: WorkType,
    pub is_merge_commit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestEvidence {
    pub id: String,
    pub number: i64,
    pub title: Option<String>,
    pub author_login: Option<String>,
    pub state: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub work_type: WorkType,
    pub is_draft: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueEvidence {
    pub id: String,
    pub number: i64,
    pub title: Option<String>,
    pub author_login: Option<String>,
    pub state: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub work_type: WorkType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentationEvidence {
    pub path: String,
    pub change_type: String,
    pub commit_sha: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub is_roadmap: bool,
    pub is_adr: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkTypeGrouping {
    pub work_type: WorkType,
    pub commit_count: usize,
    pub pr_count: usize,
    pub issue_count: usize,
    pub sample_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviousReportSummary {
    pub report_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: ReportStatus,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub event_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryMetadata {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub estate_id: Option<String>,
    pub documentation_paths: Vec<String>,
}

impl RepositoryMetadata {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Immutable evidence snapshot feeding one repository-scope report (C5
/// output).
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryEvidenceBundle {
    pub repository: RepositoryMetadata,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub previous_reports: Vec<PreviousReportSummary>,
    pub commits: Vec<CommitEvidence>,
    pub pull_requests: Vec<PullRequestEvidence>,
    pub issues: Vec<IssueEvidence>,
    pub documentation_changes: Vec<DocumentationEvidence>,
    pub work_type_groupings: Vec<WorkTypeGrouping>,
    pub event_fact_ids: Vec<i64>,
    pub generated_at: DateTime<Utc>,
}

impl RepositoryEvidenceBundle {
    pub fn total_event_count(&self) -> usize {
        self.commits.len() + self.pull_requests.len() + self.issues.len() + self.documentation_changes.len()
    }

    pub fn has_previous_context(&self) -> bool {
        !self.previous_reports.is_empty()
    }
}

/// Summary of a Silver repository's most recent status for one
/// component (C6 output).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRepositorySummary {
    pub repository_slug: String,
    pub report_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: ReportStatus,
    pub summary: String,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub next_steps: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvidence {
    pub key: String,
    pub name: String,
    pub component_type: crate::catalogue::models::ComponentType,
    pub lifecycle: crate::catalogue::models::Lifecycle,
    pub description: Option<String>,
    pub repository_slug: Option<String>,
    pub repository_summary: Option<ComponentRepositorySummary>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDependencyEvidence {
    pub from_component: String,
    pub to_component: String,
    pub relationship: crate::catalogue::models::EdgeRelationship,
    pub kind: crate::catalogue::models::EdgeKind,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMetadata {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub programme: Option<String>,
    pub documentation_paths: Vec<String>,
}

/// Immutable evidence snapshot feeding one project-scope report (C6
/// output).
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectEvidenceBundle {
    pub project: ProjectMetadata,
    pub components: Vec<ComponentEvidence>,
    pub dependencies: Vec<ComponentDependencyEvidence>,
    pub previous_reports: Vec<PreviousReportSummary>,
    pub generated_at: DateTime<Utc>,
}
