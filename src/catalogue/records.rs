//! Persistent-side records for the catalogue importer (C3), as distinct
//! from the declarative [`super::models`] value objects they are
//! reconciled against.

use chrono::{DateTime, Utc};

use super::models::{ComponentType, EdgeKind, EdgeRelationship, Lifecycle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstateRecord {
    pub id: String,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub estate_id: String,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub programme: Option<String>,
    pub noise_json: serde_json::Value,
    pub status_json: serde_json::Value,
    pub documentation_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub documentation_paths: Vec<String>,
    /// Whether the registry synchroniser should treat this repository
    /// as eligible for ingestion when first projecting it into Silver.
    /// The catalogue currently has no YAML field that disables a
    /// declared repository, so this is always `true`; the field exists
    /// so the registry sync contract (`ingestion_enabled =
    /// catalogue.is_active`) has something concrete to read.
    pub is_active: bool,
}

impl RepositoryRecord {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    pub id: String,
    pub project_id: String,
    pub key: String,
    pub name: String,
    pub component_type: ComponentType,
    pub lifecycle: Lifecycle,
    pub description: Option<String>,
    pub notes: Vec<String>,
    pub repository_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentEdgeKey {
    pub from_component_id: String,
    pub to_component_id: String,
    pub relationship: EdgeRelationship,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEdgeRecord {
    pub id: String,
    pub from_component_id: String,
    pub to_component_id: String,
    pub relationship: EdgeRelationship,
    pub kind: EdgeKind,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueImportRecord {
    pub id: String,
    pub estate_id: String,
    pub commit_sha: String,
    pub imported_at: DateTime<Utc>,
}

/// Counts of created/updated/deleted rows for one record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
}

impl ChangeCounts {
    pub fn record_created(&mut self) {
        self.created += 1;
    }
    pub fn record_updated(&mut self) {
        self.updated += 1;
    }
    pub fn record_deleted(&mut self) {
        self.deleted += 1;
    }
}

/// Outcome of one [`crate::catalogue::importer::import_catalogue`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogueImportResult {
    pub skipped: bool,
    pub projects: ChangeCounts,
    pub components: ChangeCounts,
    pub repositories: ChangeCounts,
    pub edges: ChangeCounts,
}
