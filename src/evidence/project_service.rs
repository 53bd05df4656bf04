//! Evidence assembler, project scope (C6).
//!
//! Catalogue and Gold/Silver data are fetched from separate session
//! factories (kept distinct so the two layers may live in separate
//! databases) and joined here rather than with a cross-schema SQL join.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::catalogue::records::{ComponentEdgeRecord, ComponentRecord};

use super::models::{
    ComponentDependencyEvidence, ComponentEvidence, ComponentRepositorySummary, PreviousReportSummary,
    ProjectEvidenceBundle, ProjectMetadata,
};

/// One component per catalogue record, attaching a repository summary
/// when its `repository_id` resolves to a known latest-report summary.
pub fn build_component_evidence(
    components: &[ComponentRecord],
    repo_slug_by_catalogue_id: &HashMap<String, String>,
    summaries_by_catalogue_repo_id: &HashMap<String, ComponentRepositorySummary>,
) -> Vec<ComponentEvidence> {
    components
        .iter()
        .map(|comp| {
            let (repository_slug, repository_summary) = match &comp.repository_id {
                Some(repo_id) => (
                    repo_slug_by_catalogue_id.get(repo_id).cloned(),
                    summaries_by_catalogue_repo_id.get(repo_id).cloned(),
                ),
                None => (None, None),
            };
            ComponentEvidence {
                key: comp.key.clone(),
                name: comp.name.clone(),
                component_type: comp.component_type,
                lifecycle: comp.lifecycle,
                description: comp.description.clone(),
                repository_slug,
                repository_summary,
                notes: comp.notes.clone(),
            }
        })
        .collect()
}

/// One dependency per edge whose target component also belongs to this
/// project; cross-project edge targets are silently excluded.
pub fn build_dependency_evidence(
    edges: &[ComponentEdgeRecord],
    component_key_by_id: &HashMap<String, String>,
) -> Vec<ComponentDependencyEvidence> {
    edges
        .iter()
        .filter_map(|edge| {
            let from_component = component_key_by_id.get(&edge.from_component_id)?;
            let to_component = component_key_by_id.get(&edge.to_component_id)?;
            Some(ComponentDependencyEvidence {
                from_component: from_component.clone(),
                to_component: to_component.clone(),
                relationship: edge.relationship,
                kind: edge.kind,
                rationale: edge.rationale.clone(),
            })
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub fn assemble_bundle(
    project: ProjectMetadata,
    components: &[ComponentRecord],
    edges: &[ComponentEdgeRecord],
    repo_slug_by_catalogue_id: &HashMap<String, String>,
    summaries_by_catalogue_repo_id: &HashMap<String, ComponentRepositorySummary>,
    previous_reports: Vec<PreviousReportSummary>,
    generated_at: DateTime<Utc>,
) -> ProjectEvidenceBundle {
    let component_key_by_id: HashMap<String, String> =
        components.iter().map(|c| (c.id.clone(), c.key.clone())).collect();

    ProjectEvidenceBundle {
        project,
        components: build_component_evidence(components, repo_slug_by_catalogue_id, summaries_by_catalogue_repo_id),
        dependencies: build_dependency_evidence(edges, &component_key_by_id),
        previous_reports,
        generated_at,
    }
}

#[cfg(feature = "database")]
pub mod executor {
    use std::collections::{HashMap, HashSet};

    use chrono::Utc;
    use sqlx::{PgPool, Row};

    use crate::catalogue::records::{ComponentEdgeRecord, ComponentRecord};
    use crate::evidence::models::{ComponentRepositorySummary, PreviousReportSummary, ProjectMetadata, ReportStatus};

    use super::assemble_bundle;

    #[derive(Debug, thiserror::Error)]
    pub enum ProjectEvidenceError {
        #[error("project not found: key={key}, estate_id={estate_id}")]
        NotFound { key: String, estate_id: String },
        #[error(transparent)]
        Database(#[from] sqlx::Error),
    }

    #[derive(Clone)]
    pub struct ProjectEvidenceService {
        catalogue_pool: PgPool,
        gold_pool: PgPool,
        max_previous_reports: i64,
    }

    impl ProjectEvidenceService {
        pub fn new(catalogue_pool: PgPool, gold_pool: PgPool, max_previous_reports: i64) -> Self {
            Self {
                catalogue_pool,
                gold_pool,
                max_previous_reports,
            }
        }

        pub async fn build_bundle(
            &self,
            project_key: &str,
            estate_id: &str,
        ) -> Result<crate::evidence::models::ProjectEvidenceBundle, ProjectEvidenceError> {
            let project_row = sqlx::query(
                "SELECT id, key, name, description, programme, documentation_paths FROM project_records WHERE key = $1 AND estate_id = $2",
            )
            .bind(project_key)
            .bind(estate_id)
            .fetch_optional(&self.catalogue_pool)
            .await?
            .ok_or_else(|| ProjectEvidenceError::NotFound {
                key: project_key.to_string(),
                estate_id: estate_id.to_string(),
            })?;

            let project_id: String = project_row.get("id");
            let project = ProjectMetadata {
                key: project_row.get("key"),
                name: project_row.get("name"),
                description: project_row.get("description"),
                programme: project_row.get("programme"),
                documentation_paths: project_row.get("documentation_paths"),
            };

            let components = self.fetch_components(&project_id).await?;
            let component_ids: Vec<String> = components.iter().map(|c| c.id.clone()).collect();
            let edges = self.fetch_edges(&component_ids).await?;
            let repo_slug_by_catalogue_id = self.collect_repo_slugs(&components).await?;

            let catalogue_repo_ids: HashSet<String> = repo_slug_by_catalogue_id.keys().cloned().collect();
            let summaries_by_catalogue_repo_id =
                self.fetch_latest_summaries(&catalogue_repo_ids, estate_id).await?;
            let previous_reports = self.fetch_previous_project_reports(project_key, estate_id).await?;

            Ok(assemble_bundle(
                project,
                &components,
                &edges,
                &repo_slug_by_catalogue_id,
                &summaries_by_catalogue_repo_id,
                previous_reports,
                Utc::now(),
            ))
        }

        async fn fetch_components(&self, project_id: &str) -> Result<Vec<ComponentRecord>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT id, project_id, key, name, component_type, lifecycle, description, notes, repository_id
                   FROM component_records WHERE project_id = $1"#,
            )
            .bind(project_id)
            .fetch_all(&self.catalogue_pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| ComponentRecord {
                    id: row.get("id"),
                    project_id: row.get("project_id"),
                    key: row.get("key"),
                    name: row.get("name"),
                    component_type: crate::catalogue::storage::parse_component_type(row.get("component_type")),
                    lifecycle: crate::catalogue::storage::parse_lifecycle(row.get("lifecycle")),
                    description: row.get("description"),
                    notes: row.get("notes"),
                    repository_id: row.get("repository_id"),
                })
                .collect())
        }

        async fn fetch_edges(&self, component_ids: &[String]) -> Result<Vec<ComponentEdgeRecord>, sqlx::Error> {
            if component_ids.is_empty() {
                return Ok(Vec::new());
            }
            let rows = sqlx::query(
                r#"SELECT id, from_component_id, to_component_id, relationship, kind, rationale
                   FROM component_edge_records WHERE from_component_id = ANY($1)"#,
            )
            .bind(component_ids)
            .fetch_all(&self.catalogue_pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| ComponentEdgeRecord {
                    id: row.get("id"),
                    from_component_id: row.get("from_component_id"),
                    to_component_id: row.get("to_component_id"),
                    relationship: crate::catalogue::storage::parse_relationship(row.get("relationship")),
                    kind: crate::catalogue::storage::parse_edge_kind(row.get("kind")),
                    rationale: row.get("rationale"),
                })
                .collect())
        }

        async fn collect_repo_slugs(
            &self,
            components: &[ComponentRecord],
        ) -> Result<HashMap<String, String>, sqlx::Error> {
            let repo_ids: Vec<String> = components.iter().filter_map(|c| c.repository_id.clone()).collect();
            if repo_ids.is_empty() {
                return Ok(HashMap::new());
            }
            let rows = sqlx::query("SELECT id, owner, name FROM repository_records WHERE id = ANY($1)")
                .bind(&repo_ids)
                .fetch_all(&self.catalogue_pool)
                .await?;
            Ok(rows
                .iter()
                .map(|row| {
                    let id: String = row.get("id");
                    let owner: String = row.get("owner");
                    let name: String = row.get("name");
                    (id, format!("{owner}/{name}"))
                })
                .collect())
        }

        /// Fetch only the latest repository-scope report per Silver
        /// repository via a windowed row-number query, scoped to
        /// `estate_id`, keyed back by catalogue repository id.
        async fn fetch_latest_summaries(
            &self,
            catalogue_repo_ids: &HashSet<String>,
            estate_id: &str,
        ) -> Result<HashMap<String, ComponentRepositorySummary>, sqlx::Error> {
            if catalogue_repo_ids.is_empty() {
                return Ok(HashMap::new());
            }
            let catalogue_ids: Vec<String> = catalogue_repo_ids.iter().cloned().collect();

            let silver_rows = sqlx::query(
                r#"SELECT id, owner, name, catalogue_repository_id
                   FROM silver_repositories
                   WHERE catalogue_repository_id = ANY($1) AND estate_id = $2"#,
            )
            .bind(&catalogue_ids)
            .bind(estate_id)
            .fetch_all(&self.gold_pool)
            .await?;
            if silver_rows.is_empty() {
                return Ok(HashMap::new());
            }

            let mut catalogue_id_by_silver_id = HashMap::new();
            let mut slug_by_silver_id = HashMap::new();
            let mut silver_ids = Vec::new();
            for row in &silver_rows {
                let silver_id: String = row.get("id");
                let owner: String = row.get("owner");
                let name: String = row.get("name");
                let catalogue_repository_id: Option<String> = row.get("catalogue_repository_id");
                if let Some(catalogue_id) = catalogue_repository_id {
                    catalogue_id_by_silver_id.insert(silver_id.clone(), catalogue_id);
                }
                slug_by_silver_id.insert(silver_id.clone(), format!("{owner}/{name}"));
                silver_ids.push(silver_id);
            }

            let report_rows = sqlx::query(
                r#"SELECT id, repository_id, window_start, window_end, machine_summary, generated_at
                   FROM (
                       SELECT id, repository_id, window_start, window_end, machine_summary, generated_at,
                              row_number() OVER (PARTITION BY repository_id ORDER BY generated_at DESC) AS rn
                       FROM reports
                       WHERE scope = 'repository' AND repository_id = ANY($1)
                   ) ranked
                   WHERE rn = 1"#,
            )
            .bind(&silver_ids)
            .fetch_all(&self.gold_pool)
            .await?;

            let mut result = HashMap::new();
            for row in report_rows {
                let silver_repo_id: String = row.get("repository_id");
                let Some(catalogue_repo_id) = catalogue_id_by_silver_id.get(&silver_repo_id) else {
                    continue;
                };
                let slug = slug_by_silver_id
                    .get(&silver_repo_id)
                    .cloned()
                    .unwrap_or_default();
                let summary: serde_json::Value = row.get("machine_summary");
                result.insert(
                    catalogue_repo_id.clone(),
                    ComponentRepositorySummary {
                        repository_slug: slug,
                        report_id: row.get("id"),
                        window_start: row.get("window_start"),
                        window_end: row.get("window_end"),
                        status: ReportStatus::parse(summary.get("status").and_then(|v| v.as_str())),
                        summary: summary
                            .get("summary")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        highlights: json_string_array(&summary, "highlights"),
                        risks: json_string_array(&summary, "risks"),
                        next_steps: json_string_array(&summary, "next_steps"),
                        generated_at: row.get("generated_at"),
                    },
                );
            }
            Ok(result)
        }

        async fn fetch_previous_project_reports(
            &self,
            project_key: &str,
            estate_id: &str,
        ) -> Result<Vec<PreviousReportSummary>, sqlx::Error> {
            let report_project_row = sqlx::query(
                "SELECT id FROM report_projects WHERE key = $1 AND estate_id = $2",
            )
            .bind(project_key)
            .bind(estate_id)
            .fetch_optional(&self.gold_pool)
            .await?;
            let Some(report_project_row) = report_project_row else {
                return Ok(Vec::new());
            };
            let report_project_id: String = report_project_row.get("id");

            let rows = sqlx::query(
                r#"SELECT id, window_start, window_end, machine_summary
                   FROM reports
                   WHERE scope = 'project' AND project_id = $1
                   ORDER BY window_end DESC
                   LIMIT $2"#,
            )
            .bind(&report_project_id)
            .bind(self.max_previous_reports)
            .fetch_all(&self.gold_pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| {
                    let summary: serde_json::Value = row.get("machine_summary");
                    PreviousReportSummary {
                        report_id: row.get("id"),
                        window_start: row.get("window_start"),
                        window_end: row.get("window_end"),
                        status: ReportStatus::parse(summary.get("status").and_then(|v| v.as_str())),
                        highlights: json_string_array(&summary, "highlights"),
                        risks: json_string_array(&summary, "risks"),
                        event_count: 0,
                    }
                })
                .collect())
        }
    }

    fn json_string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::models::{ComponentType, EdgeKind, EdgeRelationship, Lifecycle};
    use chrono::TimeZone;

    fn component(id: &str, key: &str, repository_id: Option<&str>) -> ComponentRecord {
        ComponentRecord {
            id: id.to_string(),
            project_id: "proj-1".to_string(),
            key: key.to_string(),
            name: key.to_string(),
            component_type: ComponentType::Service,
            lifecycle: Lifecycle::Active,
            description: None,
            notes: vec![],
            repository_id: repository_id.map(str::to_string),
        }
    }

    #[test]
    fn component_without_repository_has_no_summary() {
        let components = vec![component("c1", "api", None)];
        let result = build_component_evidence(&components, &HashMap::new(), &HashMap::new());
        assert_eq!(result.len(), 1);
        assert!(result[0].repository_slug.is_none());
        assert!(result[0].repository_summary.is_none());
    }

    #[test]
    fn cross_project_edge_targets_are_silently_excluded() {
        let edges = vec![ComponentEdgeRecord {
            id: "e1".to_string(),
            from_component_id: "c1".to_string(),
            to_component_id: "outside-project".to_string(),
            relationship: EdgeRelationship::DependsOn,
            kind: EdgeKind::Runtime,
            rationale: None,
        }];
        let mut component_key_by_id = HashMap::new();
        component_key_by_id.insert("c1".to_string(), "api".to_string());
        let result = build_dependency_evidence(&edges, &component_key_by_id);
        assert!(result.is_empty());
    }

    #[test]
    fn in_project_edge_is_retained_with_resolved_keys() {
        let edges = vec![ComponentEdgeRecord {
            id: "e1".to_string(),
            from_component_id: "c1".to_string(),
            to_component_id: "c2".to_string(),
            relationship: EdgeRelationship::DependsOn,
            kind: EdgeKind::Runtime,
            rationale: Some("shared db".to_string()),
        }];
        let mut component_key_by_id = HashMap::new();
        component_key_by_id.insert("c1".to_string(), "api".to_string());
        component_key_by_id.insert("c2".to_string(), "worker".to_string());
        let result = build_dependency_evidence(&edges, &component_key_by_id);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].from_component, "api");
        assert_eq!(result[0].to_component, "worker");
    }

    #[test]
    fn assembled_bundle_carries_project_metadata_through() {
        let project = ProjectMetadata {
            key: "wildside".to_string(),
            name: "Wildside".to_string(),
            description: None,
            programme: None,
            documentation_paths: vec![],
        };
        let bundle = assemble_bundle(
            project.clone(),
            &[],
            &[],
            &HashMap::new(),
            &HashMap::new(),
            vec![],
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        );
        assert_eq!(bundle.project, project);
        assert!(bundle.components.is_empty());
    }
}
