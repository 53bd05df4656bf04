//! Error taxonomy for the registry synchroniser (C4).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    NotFound(#[from] RepositoryNotFoundError),
    #[error(transparent)]
    Sync(#[from] RegistrySyncError),
    #[error(transparent)]
    Pagination(#[from] NegativePaginationError),
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("repository not found: {slug}")]
pub struct RepositoryNotFoundError {
    pub slug: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("sync failed for estate {estate_key}: {reason}")]
pub struct RegistrySyncError {
    pub estate_key: String,
    pub reason: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{parameter} must be non-negative")]
pub struct NegativePaginationError {
    pub parameter: &'static str,
}
