//! Postgres-backed storage for the catalogue importer (C3), following
//! the repository pattern: one struct wrapping a pool, raw
//! runtime-checked `sqlx::query`/`query_as` calls, manual row mapping.

#![cfg(feature = "database")]

use std::collections::{HashMap, HashSet};

use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::importer::{CatalogueImportError, ExistingEstateState, PlanStep, ReconciliationPlan};
use super::models::{ComponentType, EdgeKind, EdgeRelationship, Lifecycle};
use super::records::{
    CatalogueImportResult, ComponentEdgeRecord, ComponentRecord, EstateRecord, ProjectRecord,
    RepositoryRecord,
};

#[derive(Clone)]
pub struct CatalogueStorage {
    pool: PgPool,
}

pub(crate) fn component_type_str(t: ComponentType) -> &'static str {
    match t {
        ComponentType::Service => "service",
        ComponentType::Ui => "ui",
        ComponentType::Library => "library",
        ComponentType::DataPipeline => "data-pipeline",
        ComponentType::Job => "job",
        ComponentType::Tooling => "tooling",
        ComponentType::Other => "other",
    }
}

pub(crate) fn lifecycle_str(l: Lifecycle) -> &'static str {
    match l {
        Lifecycle::Planned => "planned",
        Lifecycle::Active => "active",
        Lifecycle::Deprecated => "deprecated",
    }
}

pub(crate) fn edge_kind_str(k: EdgeKind) -> &'static str {
    match k {
        EdgeKind::Runtime => "runtime",
        EdgeKind::Dev => "dev",
        EdgeKind::Test => "test",
        EdgeKind::Ops => "ops",
    }
}

pub(crate) fn relationship_str(r: EdgeRelationship) -> &'static str {
    r.as_str()
}

impl CatalogueStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn import_record_exists(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        estate_key: &str,
        commit_sha: &str,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT 1 FROM catalogue_import_records cir
               JOIN estates e ON e.id = cir.estate_id
               WHERE e.key = $1 AND cir.commit_sha = $2"#,
        )
        .bind(estate_key)
        .bind(commit_sha)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.is_some())
    }

    pub async fn ensure_estate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        name: &str,
    ) -> Result<EstateRecord, sqlx::Error> {
        let row = sqlx::query(
            r#"INSERT INTO estates (id, key, name)
               VALUES ($1, $2, $3)
               ON CONFLICT (key) DO UPDATE SET name = EXCLUDED.name
               RETURNING id, key, name"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(key)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

        Ok(EstateRecord {
            id: row.get("id"),
            key: row.get("key"),
            name: row.get("name"),
        })
    }

    pub async fn load_existing_state(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        estate_id: &str,
    ) -> Result<ExistingEstateState, sqlx::Error> {
        let project_rows = sqlx::query(
            r#"SELECT id, estate_id, key, name, description, programme, noise_json, status_json, documentation_paths
               FROM project_records WHERE estate_id = $1"#,
        )
        .bind(estate_id)
        .fetch_all(&mut **tx)
        .await?;
        let projects: Vec<ProjectRecord> = project_rows
            .iter()
            .map(|row| ProjectRecord {
                id: row.get("id"),
                estate_id: row.get("estate_id"),
                key: row.get("key"),
                name: row.get("name"),
                description: row.get("description"),
                programme: row.get("programme"),
                noise_json: row.get("noise_json"),
                status_json: row.get("status_json"),
                documentation_paths: row.get("documentation_paths"),
            })
            .collect();

        let project_ids: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();

        let component_rows = if project_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query(
                r#"SELECT id, project_id, key, name, component_type, lifecycle, description, notes, repository_id
                   FROM component_records WHERE project_id = ANY($1)"#,
            )
            .bind(&project_ids)
            .fetch_all(&mut **tx)
            .await?
        };
        let components: Vec<ComponentRecord> = component_rows
            .iter()
            .map(|row| {
                let type_str: String = row.get("component_type");
                let lifecycle_str: String = row.get("lifecycle");
                ComponentRecord {
                    id: row.get("id"),
                    project_id: row.get("project_id"),
                    key: row.get("key"),
                    name: row.get("name"),
                    component_type: parse_component_type(&type_str),
                    lifecycle: parse_lifecycle(&lifecycle_str),
                    description: row.get("description"),
                    notes: row.get("notes"),
                    repository_id: row.get("repository_id"),
                }
            })
            .collect();

        let component_ids: Vec<String> = components.iter().map(|c| c.id.clone()).collect();
        let edge_rows = if component_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query(
                r#"SELECT id, from_component_id, to_component_id, relationship, kind, rationale
                   FROM component_edge_records WHERE from_component_id = ANY($1)"#,
            )
            .bind(&component_ids)
            .fetch_all(&mut **tx)
            .await?
        };
        let edges: Vec<ComponentEdgeRecord> = edge_rows
            .iter()
            .map(|row| {
                let relationship: String = row.get("relationship");
                let kind: String = row.get("kind");
                ComponentEdgeRecord {
                    id: row.get("id"),
                    from_component_id: row.get("from_component_id"),
                    to_component_id: row.get("to_component_id"),
                    relationship: parse_relationship(&relationship),
                    kind: parse_edge_kind(&kind),
                    rationale: row.get("rationale"),
                }
            })
            .collect();

        let repo_rows = sqlx::query(
            r#"SELECT DISTINCT r.id, r.owner, r.name, r.default_branch, r.documentation_paths
               FROM repository_records r
               JOIN component_records c ON c.repository_id = r.id
               WHERE c.project_id = ANY($1)"#,
        )
        .bind(&project_ids)
        .fetch_all(&mut **tx)
        .await
        .unwrap_or_default();
        let mut repositories_by_slug = HashMap::new();
        for row in &repo_rows {
            let record = RepositoryRecord {
                id: row.get("id"),
                owner: row.get("owner"),
                name: row.get("name"),
                default_branch: row.get("default_branch"),
                documentation_paths: row.get("documentation_paths"),
                is_active: true,
            };
            repositories_by_slug.insert(record.slug(), record);
        }

        let mut repository_id_referenced_by_other_estates = HashSet::new();
        for repo in repositories_by_slug.values() {
            let row = sqlx::query(
                r#"SELECT 1 FROM component_records c
                   JOIN project_records p ON p.id = c.project_id
                   WHERE c.repository_id = $1 AND p.estate_id <> $2
                   LIMIT 1"#,
            )
            .bind(&repo.id)
            .bind(estate_id)
            .fetch_optional(&mut **tx)
            .await?;
            if row.is_some() {
                repository_id_referenced_by_other_estates.insert(repo.id.clone());
            }
        }

        Ok(ExistingEstateState {
            estate: None,
            projects,
            components,
            edges,
            repositories_by_slug,
            repository_id_referenced_by_other_estates,
            existing_import_record: false,
        })
    }

    pub async fn apply_plan(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        estate_id: &str,
        plan: &ReconciliationPlan,
    ) -> Result<CatalogueImportResult, CatalogueImportError> {
        let mut project_ids_by_key: HashMap<String, String> = HashMap::new();

        for step in &plan.project_steps {
            match step {
                PlanStep::Insert((project, _)) => {
                    let row = sqlx::query(
                        r#"INSERT INTO project_records (id, estate_id, key, name, description, programme, noise_json, status_json, documentation_paths)
                           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                           RETURNING id"#,
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(estate_id)
                    .bind(&project.key)
                    .bind(&project.name)
                    .bind(&project.description)
                    .bind(&project.programme)
                    .bind(serde_json::to_value(&project.noise).unwrap_or(serde_json::Value::Null))
                    .bind(serde_json::to_value(&project.status).unwrap_or(serde_json::Value::Null))
                    .bind(&project.documentation_paths)
                    .fetch_one(&mut **tx)
                    .await?;
                    project_ids_by_key.insert(project.key.clone(), row.get("id"));
                }
                PlanStep::Update { id, incoming: (project, _) } => {
                    sqlx::query(
                        r#"UPDATE project_records
                           SET name = $1, description = $2, programme = $3, noise_json = $4, status_json = $5, documentation_paths = $6
                           WHERE id = $7"#,
                    )
                    .bind(&project.name)
                    .bind(&project.description)
                    .bind(&project.programme)
                    .bind(serde_json::to_value(&project.noise).unwrap_or(serde_json::Value::Null))
                    .bind(serde_json::to_value(&project.status).unwrap_or(serde_json::Value::Null))
                    .bind(&project.documentation_paths)
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                    project_ids_by_key.insert(project.key.clone(), id.clone());
                }
                PlanStep::Delete(existing) => {
                    sqlx::query("DELETE FROM project_records WHERE id = $1")
                        .bind(&existing.id)
                        .execute(&mut **tx)
                        .await?;
                }
            }
        }

        let mut repository_ids_by_slug: HashMap<String, String> = HashMap::new();
        for repo in &plan.repository_upserts {
            let row = sqlx::query(
                r#"INSERT INTO repository_records (id, owner, name, default_branch, documentation_paths)
                   VALUES ($1, $2, $3, $4, $5)
                   ON CONFLICT (owner, name) DO UPDATE
                     SET default_branch = EXCLUDED.default_branch,
                         documentation_paths = EXCLUDED.documentation_paths
                   RETURNING id"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&repo.owner)
            .bind(&repo.name)
            .bind(&repo.default_branch)
            .bind(&repo.documentation_paths)
            .fetch_one(&mut **tx)
            .await?;
            repository_ids_by_slug.insert(repo.slug.clone(), row.get("id"));
        }
        for repo in &plan.repositories_to_delete {
            sqlx::query("DELETE FROM repository_records WHERE id = $1")
                .bind(&repo.id)
                .execute(&mut **tx)
                .await?;
        }

        let mut component_ids_by_key: HashMap<String, String> = HashMap::new();
        for step in &plan.component_steps {
            match step {
                PlanStep::Insert(input) => {
                    let project_id = project_ids_by_key
                        .get(&input.project_key)
                        .cloned()
                        .ok_or_else(|| {
                            CatalogueImportError::UnknownEdgeTarget(input.project_key.clone())
                        })?;
                    let repository_id = input
                        .repository_slug
                        .as_ref()
                        .and_then(|slug| repository_ids_by_slug.get(slug).cloned());
                    let row = sqlx::query(
                        r#"INSERT INTO component_records (id, project_id, key, name, component_type, lifecycle, description, notes, repository_id)
                           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                           RETURNING id"#,
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(&project_id)
                    .bind(&input.component.key)
                    .bind(&input.component.name)
                    .bind(component_type_str(input.component.r#type))
                    .bind(lifecycle_str(input.component.lifecycle))
                    .bind(&input.component.description)
                    .bind(&input.component.notes)
                    .bind(&repository_id)
                    .fetch_one(&mut **tx)
                    .await?;
                    component_ids_by_key.insert(input.component.key.clone(), row.get("id"));
                }
                PlanStep::Update { id, incoming } => {
                    let repository_id = incoming
                        .repository_slug
                        .as_ref()
                        .and_then(|slug| repository_ids_by_slug.get(slug).cloned());
                    sqlx::query(
                        r#"UPDATE component_records
                           SET name = $1, component_type = $2, lifecycle = $3, description = $4, notes = $5, repository_id = $6
                           WHERE id = $7"#,
                    )
                    .bind(&incoming.component.name)
                    .bind(component_type_str(incoming.component.r#type))
                    .bind(lifecycle_str(incoming.component.lifecycle))
                    .bind(&incoming.component.description)
                    .bind(&incoming.component.notes)
                    .bind(&repository_id)
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                    component_ids_by_key.insert(incoming.component.key.clone(), id.clone());
                }
                PlanStep::Delete(existing) => {
                    sqlx::query("DELETE FROM component_records WHERE id = $1")
                        .bind(&existing.id)
                        .execute(&mut **tx)
                        .await?;
                }
            }
        }

        let mut edges_created = 0u32;
        let mut edges_updated = 0u32;
        for step in &plan.edge_steps {
            if let PlanStep::Insert(input) = step {
                let from_id = component_ids_by_key
                    .get(&input.from_component_key)
                    .cloned()
                    .ok_or_else(|| {
                        CatalogueImportError::UnknownEdgeTarget(input.from_component_key.clone())
                    })?;
                let to_id = component_ids_by_key
                    .get(&input.to_component_key)
                    .cloned()
                    .ok_or_else(|| {
                        CatalogueImportError::UnknownEdgeTarget(input.to_component_key.clone())
                    })?;
                let existing_row = sqlx::query(
                    r#"SELECT id, kind, rationale FROM component_edge_records
                       WHERE from_component_id = $1 AND to_component_id = $2 AND relationship = $3"#,
                )
                .bind(&from_id)
                .bind(&to_id)
                .bind(relationship_str(input.relationship))
                .fetch_optional(&mut **tx)
                .await?;

                match existing_row {
                    Some(row) => {
                        let existing_kind: String = row.get("kind");
                        let existing_rationale: Option<String> = row.get("rationale");
                        if existing_kind != edge_kind_str(input.kind) || existing_rationale != input.rationale {
                            sqlx::query(
                                "UPDATE component_edge_records SET kind = $1, rationale = $2 WHERE id = $3",
                            )
                            .bind(edge_kind_str(input.kind))
                            .bind(&input.rationale)
                            .bind(row.get::<String, _>("id"))
                            .execute(&mut **tx)
                            .await?;
                            edges_updated += 1;
                        }
                    }
                    None => {
                        sqlx::query(
                            r#"INSERT INTO component_edge_records (id, from_component_id, to_component_id, relationship, kind, rationale)
                               VALUES ($1, $2, $3, $4, $5, $6)"#,
                        )
                        .bind(Uuid::new_v4().to_string())
                        .bind(&from_id)
                        .bind(&to_id)
                        .bind(relationship_str(input.relationship))
                        .bind(edge_kind_str(input.kind))
                        .bind(&input.rationale)
                        .execute(&mut **tx)
                        .await?;
                        edges_created += 1;
                    }
                }
            }
        }

        let mut edges_deleted = 0u32;
        let valid_component_ids: Vec<String> = component_ids_by_key.values().cloned().collect();
        if !valid_component_ids.is_empty() {
            let desired_keys: HashSet<(String, String, &'static str)> = plan
                .edge_steps
                .iter()
                .filter_map(|s| match s {
                    PlanStep::Insert(input) => Some((
                        component_ids_by_key.get(&input.from_component_key)?.clone(),
                        component_ids_by_key.get(&input.to_component_key)?.clone(),
                        relationship_str(input.relationship),
                    )),
                    _ => None,
                })
                .collect();

            let stale_rows = sqlx::query(
                r#"SELECT id, from_component_id, to_component_id, relationship FROM component_edge_records
                   WHERE from_component_id = ANY($1)"#,
            )
            .bind(&valid_component_ids)
            .fetch_all(&mut **tx)
            .await?;
            for row in stale_rows {
                let from_id: String = row.get("from_component_id");
                let to_id: String = row.get("to_component_id");
                let relationship: String = row.get("relationship");
                if !desired_keys.contains(&(from_id, to_id, relationship.as_str())) {
                    sqlx::query("DELETE FROM component_edge_records WHERE id = $1")
                        .bind(row.get::<String, _>("id"))
                        .execute(&mut **tx)
                        .await?;
                    edges_deleted += 1;
                }
            }
        }

        let mut counts = plan.counts.clone();
        counts.edges.created = edges_created;
        counts.edges.updated = edges_updated;
        counts.edges.deleted = edges_deleted;
        Ok(counts)
    }

    pub async fn record_import(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        estate_id: &str,
        commit_sha: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO catalogue_import_records (id, estate_id, commit_sha, imported_at)
               VALUES ($1, $2, $3, now())
               ON CONFLICT (estate_id, commit_sha) DO NOTHING"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(estate_id)
        .bind(commit_sha)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

pub(crate) fn parse_component_type(s: &str) -> ComponentType {
    match s {
        "ui" => ComponentType::Ui,
        "library" => ComponentType::Library,
        "data-pipeline" => ComponentType::DataPipeline,
        "job" => ComponentType::Job,
        "tooling" => ComponentType::Tooling,
        "other" => ComponentType::Other,
        _ => ComponentType::Service,
    }
}

pub(crate) fn parse_lifecycle(s: &str) -> Lifecycle {
    match s {
        "planned" => Lifecycle::Planned,
        "deprecated" => Lifecycle::Deprecated,
        _ => Lifecycle::Active,
    }
}

pub(crate) fn parse_edge_kind(s: &str) -> EdgeKind {
    match s {
        "dev" => EdgeKind::Dev,
        "test" => EdgeKind::Test,
        "ops" => EdgeKind::Ops,
        _ => EdgeKind::Runtime,
    }
}

pub(crate) fn parse_relationship(s: &str) -> EdgeRelationship {
    match s {
        "blocked_by" => EdgeRelationship::BlockedBy,
        "emits_events_to" => EdgeRelationship::EmitsEventsTo,
        _ => EdgeRelationship::DependsOn,
    }
}
