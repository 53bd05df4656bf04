//! DTOs and options for the registry synchroniser (C4).

use chrono::{DateTime, Utc};

/// Operational "Silver" repository row: the registry's own projection,
/// distinct from the catalogue-side [`crate::catalogue::records::RepositoryRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilverRepository {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub estate_id: Option<String>,
    pub catalogue_repository_id: Option<String>,
    pub ingestion_enabled: bool,
    pub documentation_paths: Vec<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl SilverRepository {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Read-facing DTO returned by listing/lookup operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub ingestion_enabled: bool,
    pub documentation_paths: Vec<String>,
    pub estate_id: Option<String>,
}

impl From<&SilverRepository> for RepositoryInfo {
    fn from(repo: &SilverRepository) -> Self {
        Self {
            id: repo.id.clone(),
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            default_branch: repo.default_branch.clone(),
            ingestion_enabled: repo.ingestion_enabled,
            documentation_paths: repo.documentation_paths.clone(),
            estate_id: repo.estate_id.clone(),
        }
    }
}

/// Filter/pagination options for repository listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryListOptions {
    pub estate_id: Option<String>,
    pub ingestion_enabled: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Outcome of one [`crate::registry::sync::sync_from_catalogue`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub estate_key: String,
    pub repositories_created: u32,
    pub repositories_updated: u32,
    pub repositories_deactivated: u32,
}

impl SyncResult {
    pub fn new(estate_key: impl Into<String>) -> Self {
        Self {
            estate_key: estate_key.into(),
            ..Default::default()
        }
    }
}

/// Parse an `owner/name` slug, rejecting anything that isn't exactly
/// one `/` with non-empty segments.
pub fn parse_slug(slug: &str) -> Option<(&str, &str)> {
    let mut parts = slug.splitn(2, '/');
    let owner = parts.next()?;
    let name = parts.next()?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}
