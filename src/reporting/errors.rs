//! Error types owned by the reporting orchestrator (C7).

use thiserror::Error;

use crate::gold::ReportConstructionError;

/// Raised when a status model's output fails validation after the
/// configured number of attempts. Carries the review marker id created
/// so the issue can be tracked down by a human.
#[derive(Debug, Error)]
#[error("status result failed validation after {attempts} attempt(s): {issues:?} (review id: {review_id})")]
pub struct ReportValidationError {
    pub attempts: u32,
    pub issues: Vec<String>,
    pub review_id: String,
}

#[derive(Debug, Error)]
pub enum ReportingError {
    #[cfg(feature = "database")]
    #[error(transparent)]
    Evidence(#[from] crate::evidence::EvidenceError),
    #[error(transparent)]
    Construction(#[from] ReportConstructionError),
    #[error(transparent)]
    Validation(#[from] ReportValidationError),
    #[error("status model invocation failed: {0}")]
    StatusModel(#[from] super::status::StatusModelError),
    #[cfg(feature = "database")]
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Aggregates the per-repository failures encountered while generating
/// reports across an estate. If any repository fails, the whole
/// `run_for_estate` call fails with this error rather than returning a
/// partial success list; successful repositories are not represented
/// here.
#[derive(Debug, Error)]
#[error("{} of {} repositories failed to generate a report", failures.len(), attempted)]
pub struct EstateReportError {
    pub attempted: usize,
    pub failures: Vec<(String, ReportingError)>,
}
