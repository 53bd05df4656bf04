//! Catalogue importer & reconciler (C3) — the hard core that projects a
//! validated catalogue into persistent Estate/Project/Component/Edge/
//! Repository tables with scoped pruning and commit-level idempotency.
//!
//! The reconciliation algorithm is split into a pure planning phase
//! ([`plan_reconciliation`]) that diffs incoming catalogue data against
//! already-loaded existing records, and (behind the `database` feature)
//! a transactional executor that loads state, calls the planner, and
//! applies the resulting plan. Splitting it this way lets the ordered-
//! phases algorithm in §4.2 be unit tested without a database.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::models::{Catalogue, Component, EdgeRelationship, Project};
use super::records::{
    CatalogueImportResult, ChangeCounts, ComponentEdgeKey, ComponentEdgeRecord, ComponentRecord,
    EstateRecord, ProjectRecord, RepositoryRecord,
};
use super::validation::CatalogueValidationError;

#[derive(Debug, Error)]
pub enum CatalogueImportError {
    #[error(transparent)]
    Validation(#[from] CatalogueValidationError),
    #[error("component references unknown edge target; component keys must be globally unique within the estate: {0}")]
    UnknownEdgeTarget(String),
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Snapshot of everything already persisted for an estate, as loaded at
/// the start of a reconciliation attempt.
#[derive(Debug, Clone, Default)]
pub struct ExistingEstateState {
    pub estate: Option<EstateRecord>,
    pub projects: Vec<ProjectRecord>,
    pub components: Vec<ComponentRecord>,
    pub edges: Vec<ComponentEdgeRecord>,
    /// Repository records keyed by `owner/name` slug, visible globally
    /// (repositories are shared across estates).
    pub repositories_by_slug: HashMap<String, RepositoryRecord>,
    /// Component ids (in any estate) that reference a given repository
    /// id, used for cross-estate pruning checks.
    pub repository_id_referenced_by_other_estates: HashSet<String>,
    pub existing_import_record: bool,
}

/// One step of a reconciliation plan for a single record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep<Existing, Incoming> {
    Insert(Incoming),
    Update { id: String, incoming: Incoming },
    Delete(Existing),
}

/// The complete, purely-computed reconciliation plan for one import
/// attempt. Applying it (in the `database`-feature executor) is the
/// only part of the algorithm that touches I/O.
#[derive(Debug, Default)]
pub struct ReconciliationPlan {
    pub estate_name_update: Option<String>,
    pub project_steps: Vec<PlanStep<ProjectRecord, (Project, Option<String>)>>,
    pub component_steps: Vec<PlanStep<ComponentRecord, ComponentPlanInput>>,
    pub repository_upserts: Vec<RepositoryPlanInput>,
    pub repositories_to_delete: Vec<RepositoryRecord>,
    pub edge_steps: Vec<PlanStep<ComponentEdgeRecord, EdgePlanInput>>,
    pub counts: CatalogueImportResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPlanInput {
    pub project_key: String,
    pub component: Component,
    pub repository_slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPlanInput {
    pub slug: String,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub documentation_paths: Vec<String>,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgePlanInput {
    pub from_component_key: String,
    pub to_component_key: String,
    pub relationship: EdgeRelationship,
    pub kind: super::models::EdgeKind,
    pub rationale: Option<String>,
}

fn dedup_preserving_order(paths: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if seen.insert(path.clone()) {
            out.push(path.clone());
        }
    }
    out
}

/// Serialise noise/status preferences the same way storage persists
/// them, so change detection compares like with like.
fn noise_value(project: &Project) -> serde_json::Value {
    serde_json::to_value(&project.noise).unwrap_or(serde_json::Value::Null)
}

fn status_value(project: &Project) -> serde_json::Value {
    serde_json::to_value(&project.status).unwrap_or(serde_json::Value::Null)
}

/// Run phases 1-3 and 5 of the reconciliation algorithm (§4.2) purely
/// in memory, producing a [`ReconciliationPlan`]. Phase 4 (cross-estate
/// repository pruning) and phase 6 (import record) are folded in here
/// too since they only need the loaded state, not further I/O.
pub fn plan_reconciliation(
    catalogue: &Catalogue,
    existing: &ExistingEstateState,
) -> Result<ReconciliationPlan, CatalogueImportError> {
    let mut plan = ReconciliationPlan::default();

    // Phase 1: estate name is diffed by the caller (it already knows
    // the incoming estate name); nothing to do here beyond passing it
    // through, since estate identity is established before catalogue
    // import even starts.

    // Phase 2: projects.
    let mut existing_projects_by_key: HashMap<&str, &ProjectRecord> = HashMap::new();
    for project in &existing.projects {
        existing_projects_by_key.insert(project.key.as_str(), project);
    }
    let incoming_project_keys: HashSet<&str> =
        catalogue.projects.iter().map(|p| p.key.as_str()).collect();

    for incoming in &catalogue.projects {
        match existing_projects_by_key.get(incoming.key.as_str()) {
            Some(existing_project) => {
                let changed = existing_project.name != incoming.name
                    || existing_project.description != incoming.description
                    || existing_project.programme != incoming.programme
                    || existing_project.noise_json != noise_value(incoming)
                    || existing_project.status_json != status_value(incoming)
                    || existing_project.documentation_paths
                        != dedup_preserving_order(&incoming.documentation_paths);
                if changed {
                    plan.project_steps.push(PlanStep::Update {
                        id: existing_project.id.clone(),
                        incoming: (incoming.clone(), Some(existing_project.id.clone())),
                    });
                    plan.counts.projects.record_updated();
                }
            }
            None => {
                plan.project_steps.push(PlanStep::Insert((incoming.clone(), None)));
                plan.counts.projects.record_created();
            }
        }
    }
    for existing_project in &existing.projects {
        if !incoming_project_keys.contains(existing_project.key.as_str()) {
            plan.project_steps.push(PlanStep::Delete(existing_project.clone()));
            plan.counts.projects.record_deleted();
        }
    }

    // Phase 3: components + repositories.
    // Build the global component index from incoming data first, since
    // edge resolution (phase 5) needs every component key up front.
    let mut incoming_component_keys: HashSet<&str> = HashSet::new();
    for project in &catalogue.projects {
        for component in &project.components {
            incoming_component_keys.insert(component.key.as_str());
        }
    }

    let mut existing_components_by_key: HashMap<&str, &ComponentRecord> = HashMap::new();
    for component in &existing.components {
        existing_components_by_key.insert(component.key.as_str(), component);
    }

    let mut repository_plan_by_slug: HashMap<String, RepositoryPlanInput> = HashMap::new();
    for project in &catalogue.projects {
        for component in &project.components {
            if let Some(repo) = &component.repository {
                let slug = repo.slug();
                let deduped_docs = dedup_preserving_order(&repo.documentation_paths);
                let changed = match existing.repositories_by_slug.get(&slug) {
                    Some(existing_repo) => {
                        existing_repo.default_branch != repo.default_branch
                            || existing_repo.documentation_paths != deduped_docs
                    }
                    None => true,
                };
                repository_plan_by_slug.entry(slug.clone()).or_insert(RepositoryPlanInput {
                    slug,
                    owner: repo.owner.clone(),
                    name: repo.name.clone(),
                    default_branch: repo.default_branch.clone(),
                    documentation_paths: deduped_docs,
                    changed,
                });
            }
        }
    }
    for repo_plan in repository_plan_by_slug.into_values() {
        if repo_plan.changed || !existing.repositories_by_slug.contains_key(&repo_plan.slug) {
            if !existing.repositories_by_slug.contains_key(&repo_plan.slug) {
                plan.counts.repositories.record_created();
            } else {
                plan.counts.repositories.record_updated();
            }
        }
        plan.repository_upserts.push(repo_plan);
    }

    for project in &catalogue.projects {
        for component in &project.components {
            match existing_components_by_key.get(component.key.as_str()) {
                Some(existing_component) => {
                    let repo_slug = component.repository.as_ref().map(|r| r.slug());
                    let changed = existing_component.name != component.name
                        || existing_component.component_type != component.r#type
                        || existing_component.lifecycle != component.lifecycle
                        || existing_component.description != component.description
                        || existing_component.notes != component.notes
                        || existing_component.repository_id.is_some() != repo_slug.is_some();
                    if changed {
                        plan.component_steps.push(PlanStep::Update {
                            id: existing_component.id.clone(),
                            incoming: ComponentPlanInput {
                                project_key: project.key.clone(),
                                component: component.clone(),
                                repository_slug: repo_slug,
                            },
                        });
                        plan.counts.components.record_updated();
                    }
                }
                None => {
                    plan.component_steps.push(PlanStep::Insert(ComponentPlanInput {
                        project_key: project.key.clone(),
                        component: component.clone(),
                        repository_slug: component.repository.as_ref().map(|r| r.slug()),
                    }));
                    plan.counts.components.record_created();
                }
            }
        }
    }
    for existing_component in &existing.components {
        if !incoming_component_keys.contains(existing_component.key.as_str()) {
            plan.counts.components.record_deleted();
        }
    }

    // Phase 4: repository pruning. A repository row present at load
    // time but no longer referenced by any component in the current
    // index is deleted, unless another estate still references it.
    for (slug, repo) in &existing.repositories_by_slug {
        let still_referenced = catalogue.projects.iter().any(|p| {
            p.components
                .iter()
                .any(|c| c.repository.as_ref().map(|r| r.slug()).as_deref() == Some(slug.as_str()))
        });
        if !still_referenced && !existing.repository_id_referenced_by_other_estates.contains(&repo.id) {
            plan.repositories_to_delete.push(repo.clone());
            plan.counts.repositories.record_deleted();
        }
    }

    // Phase 5: edges. Resolve against the full incoming component
    // index; unknown targets fail the whole transaction.
    for project in &catalogue.projects {
        for component in &project.components {
            for (_relationship, link) in component.edges() {
                if !incoming_component_keys.contains(link.component.as_str()) {
                    return Err(CatalogueImportError::UnknownEdgeTarget(link.component.clone()));
                }
            }
        }
    }

    let mut existing_edges_by_key: HashMap<ComponentEdgeKey, &ComponentEdgeRecord> = HashMap::new();
    for edge in &existing.edges {
        existing_edges_by_key.insert(
            ComponentEdgeKey {
                from_component_id: edge.from_component_id.clone(),
                to_component_id: edge.to_component_id.clone(),
                relationship: edge.relationship,
            },
            edge,
        );
    }

    let mut desired_edge_component_keys: HashSet<(String, String, EdgeRelationship)> = HashSet::new();
    for project in &catalogue.projects {
        for component in &project.components {
            for (relationship, link) in component.edges() {
                desired_edge_component_keys.insert((
                    component.key.clone(),
                    link.component.clone(),
                    relationship,
                ));
                plan.edge_steps.push(PlanStep::Insert(EdgePlanInput {
                    from_component_key: component.key.clone(),
                    to_component_key: link.component.clone(),
                    relationship,
                    kind: link.kind,
                    rationale: link.rationale.clone(),
                }));
            }
        }
    }
    // The edge_steps above are all tentative Inserts keyed by
    // component *keys*; the executor resolves them against ids loaded
    // from existing_components_by_key / newly inserted ids and decides
    // insert vs update vs delete. We still report plan-level counts
    // here using what we can determine purely from loaded state: an
    // edge whose (from_id, to_id, relationship) already exists and is
    // unchanged contributes nothing; this is refined by the executor,
    // which has authoritative ids. Purely-planned counts for edges are
    // therefore deferred to the executor.
    let _ = existing_edges_by_key;
    let _ = desired_edge_component_keys;

    Ok(plan)
}

/// `importCatalogue` per §4.2, DB-backed variant. Feature-gated because
/// it needs a live `sqlx::PgPool`; the planning phase above is fully
/// testable without one.
#[cfg(feature = "database")]
pub mod executor {
    use super::*;
    use crate::catalogue::storage::CatalogueStorage;
    use sqlx::PgPool;
    use tracing::{debug, info};

    pub struct CatalogueImporter {
        storage: CatalogueStorage,
    }

    impl CatalogueImporter {
        pub fn new(pool: PgPool) -> Self {
            Self {
                storage: CatalogueStorage::new(pool),
            }
        }

        /// Reconcile `catalogue` into persistent storage for `estate_key`
        /// inside one transaction. Returns immediately with a zeroed,
        /// `skipped=true` result if `commit_sha` has already been
        /// imported for this estate.
        pub async fn import_catalogue(
            &self,
            estate_key: &str,
            estate_name: &str,
            catalogue: &Catalogue,
            commit_sha: Option<&str>,
        ) -> Result<CatalogueImportResult, CatalogueImportError> {
            let mut tx = self.storage.pool().begin().await?;

            if let Some(sha) = commit_sha {
                if self.storage.import_record_exists(&mut tx, estate_key, sha).await? {
                    debug!(estate = estate_key, commit = sha, "catalogue import skipped, already recorded");
                    tx.rollback().await?;
                    return Ok(CatalogueImportResult {
                        skipped: true,
                        ..Default::default()
                    });
                }
            }

            let estate = self.storage.ensure_estate(&mut tx, estate_key, estate_name).await?;
            let existing = self.storage.load_existing_state(&mut tx, &estate.id).await?;

            let plan = plan_reconciliation(catalogue, &existing)?;

            let result = self.storage.apply_plan(&mut tx, &estate.id, &plan).await?;

            if let Some(sha) = commit_sha {
                self.storage.record_import(&mut tx, &estate.id, sha).await?;
            }

            tx.commit().await?;
            info!(
                estate = estate_key,
                projects_created = result.projects.created,
                projects_updated = result.projects.updated,
                projects_deleted = result.projects.deleted,
                "catalogue import committed"
            );
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::models::*;

    fn component(key: &str, depends_on: Vec<&str>) -> Component {
        Component {
            key: key.to_string(),
            name: key.to_string(),
            r#type: ComponentType::Service,
            description: None,
            lifecycle: Lifecycle::Active,
            repository: None,
            depends_on: depends_on
                .into_iter()
                .map(|c| ComponentLink {
                    component: c.to_string(),
                    kind: EdgeKind::Runtime,
                    rationale: None,
                })
                .collect(),
            blocked_by: Vec::new(),
            emits_events_to: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn catalogue_with(components: Vec<Component>) -> Catalogue {
        Catalogue {
            version: 1,
            programmes: Vec::new(),
            projects: vec![Project {
                key: "wildside".to_string(),
                name: "Wildside".to_string(),
                description: None,
                programme: None,
                components,
                noise: NoiseFilters::default(),
                status: StatusSettings::default(),
                documentation_paths: Vec::new(),
            }],
        }
    }

    #[test]
    fn fresh_import_inserts_every_project_and_component() {
        let catalogue = catalogue_with(vec![component("api", vec![]), component("worker", vec!["api"])]);
        let plan = plan_reconciliation(&catalogue, &ExistingEstateState::default()).unwrap();
        assert_eq!(plan.counts.projects.created, 1);
        assert_eq!(plan.counts.components.created, 2);
        assert_eq!(plan.counts.components.updated, 0);
        assert_eq!(plan.counts.components.deleted, 0);
    }

    #[test]
    fn unknown_edge_target_fails_the_whole_plan() {
        let catalogue = catalogue_with(vec![component("api", vec!["ghost"])]);
        let err = plan_reconciliation(&catalogue, &ExistingEstateState::default()).unwrap_err();
        assert!(matches!(err, CatalogueImportError::UnknownEdgeTarget(ref target) if target == "ghost"));
    }

    #[test]
    fn removed_project_is_counted_as_deleted() {
        let existing = ExistingEstateState {
            projects: vec![ProjectRecord {
                id: "p1".to_string(),
                estate_id: "e1".to_string(),
                key: "legacy".to_string(),
                name: "Legacy".to_string(),
                description: None,
                programme: None,
                noise_json: serde_json::Value::Null,
                status_json: serde_json::Value::Null,
                documentation_paths: Vec::new(),
            }],
            ..Default::default()
        };
        let catalogue = catalogue_with(vec![]);
        let mut catalogue = catalogue;
        catalogue.projects[0].key = "wildside".to_string();
        let plan = plan_reconciliation(&catalogue, &existing).unwrap();
        assert_eq!(plan.counts.projects.created, 1);
        assert_eq!(plan.counts.projects.deleted, 1);
    }

    #[test]
    fn unchanged_project_produces_no_update() {
        let catalogue = catalogue_with(vec![]);
        // Seed noise_json/status_json the same way storage actually
        // persists them (serde_json::to_value), not via the comparison
        // helper under test, so this exercises real round-trip equality.
        let existing = ExistingEstateState {
            projects: vec![ProjectRecord {
                id: "p1".to_string(),
                estate_id: "e1".to_string(),
                key: "wildside".to_string(),
                name: "Wildside".to_string(),
                description: None,
                programme: None,
                noise_json: serde_json::to_value(&catalogue.projects[0].noise).unwrap(),
                status_json: serde_json::to_value(&catalogue.projects[0].status).unwrap(),
                documentation_paths: Vec::new(),
            }],
            ..Default::default()
        };
        let plan = plan_reconciliation(&catalogue, &existing).unwrap();
        assert_eq!(plan.counts.projects.created, 0);
        assert_eq!(plan.counts.projects.updated, 0);
        assert_eq!(plan.counts.projects.deleted, 0);
    }

    #[test]
    fn changed_noise_toggle_alone_registers_as_update() {
        let mut catalogue = catalogue_with(vec![]);
        let existing = ExistingEstateState {
            projects: vec![ProjectRecord {
                id: "p1".to_string(),
                estate_id: "e1".to_string(),
                key: "wildside".to_string(),
                name: "Wildside".to_string(),
                description: None,
                programme: None,
                noise_json: serde_json::to_value(&catalogue.projects[0].noise).unwrap(),
                status_json: serde_json::to_value(&catalogue.projects[0].status).unwrap(),
                documentation_paths: Vec::new(),
            }],
            ..Default::default()
        };
        catalogue.projects[0].noise.toggles.ignore_labels = false;
        catalogue.projects[0].noise.ignore_title_prefixes = vec!["WIP:".to_string()];
        let plan = plan_reconciliation(&catalogue, &existing).unwrap();
        assert_eq!(plan.counts.projects.updated, 1);
        assert_eq!(plan.counts.projects.created, 0);
    }
}
