//! Evidence assemblers: repository scope (C5) and project scope (C6).

pub mod classification;
pub mod models;
pub mod project_service;
pub mod repository_service;

pub use classification::ClassificationConfig;
pub use models::{
    ComponentDependencyEvidence, ComponentEvidence, ComponentRepositorySummary, CommitEvidence,
    DocumentationEvidence, IssueEvidence, PreviousReportSummary, ProjectEvidenceBundle, ProjectMetadata,
    PullRequestEvidence, ReportStatus, RepositoryEvidenceBundle, RepositoryMetadata, WorkType, WorkTypeGrouping,
};

#[cfg(feature = "database")]
pub use project_service::executor::{ProjectEvidenceError, ProjectEvidenceService};
#[cfg(feature = "database")]
pub use repository_service::executor::{EvidenceError, RepositoryEvidenceService};
