//! Gold-layer persisted reports: the reporting orchestrator's (C7)
//! exclusive write surface.

pub mod models;

#[cfg(feature = "database")]
pub mod storage;

pub use models::{
    InvalidWindowError, MachineSummary, MissingScopeIdError, Report, ReportConstructionError, ReportCoverage,
    ReportProject, ReportReview, ReportScope, ReviewState,
};

#[cfg(feature = "database")]
pub use storage::GoldStorage;
