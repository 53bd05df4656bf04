//! Catalogue → Silver repository projection (C4), pure planning phase.
//!
//! Mirrors the catalogue importer's split: [`plan_sync`] diffs catalogue
//! repositories against already-loaded Silver rows and returns a plan;
//! applying it against Postgres lives in [`super::storage`] /
//! [`super::service`] behind the `database` feature.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::catalogue::records::RepositoryRecord;

use super::models::{SilverRepository, SyncResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    Create {
        catalogue_repo: RepositoryRecord,
    },
    Update {
        silver_id: String,
        default_branch: String,
        estate_id: Option<String>,
        catalogue_repository_id: Option<String>,
        ingestion_enabled: bool,
        documentation_paths: Vec<String>,
    },
    Deactivate {
        silver_id: String,
    },
}

#[derive(Debug, Default)]
pub struct SyncPlan {
    pub steps: Vec<SyncStep>,
    pub result: SyncResult,
}

/// Diff catalogue repositories reachable from an estate against already
/// loaded Silver rows (own estate + ad-hoc-shared rows with a null
/// `estate_id`), following §4.3's `syncFromCatalogue` rules.
pub fn plan_sync(
    estate_key: &str,
    estate_id: &str,
    catalogue_repos: &HashMap<String, RepositoryRecord>,
    existing_silver: &[SilverRepository],
    now: DateTime<Utc>,
) -> SyncPlan {
    let mut plan = SyncPlan {
        result: SyncResult::new(estate_key),
        ..Default::default()
    };

    let silver_by_slug: HashMap<String, &SilverRepository> =
        existing_silver.iter().map(|r| (r.slug(), r)).collect();

    let mut seen_slugs: HashSet<&str> = HashSet::new();

    for (slug, catalogue_repo) in catalogue_repos {
        seen_slugs.insert(slug.as_str());

        match silver_by_slug.get(slug) {
            Some(silver) => {
                let new_catalogue_repository_id = Some(catalogue_repo.id.clone());
                let new_documentation_paths = catalogue_repo.documentation_paths.clone();
                let changed = silver.default_branch != catalogue_repo.default_branch
                    || silver.estate_id.as_deref() != Some(estate_id)
                    || silver.catalogue_repository_id != new_catalogue_repository_id
                    || silver.ingestion_enabled != catalogue_repo.is_active
                    || silver.documentation_paths != new_documentation_paths;
                if changed {
                    plan.steps.push(SyncStep::Update {
                        silver_id: silver.id.clone(),
                        default_branch: catalogue_repo.default_branch.clone(),
                        estate_id: Some(estate_id.to_string()),
                        catalogue_repository_id: new_catalogue_repository_id,
                        ingestion_enabled: catalogue_repo.is_active,
                        documentation_paths: new_documentation_paths,
                    });
                    plan.result.repositories_updated += 1;
                }
            }
            None => {
                plan.steps.push(SyncStep::Create {
                    catalogue_repo: catalogue_repo.clone(),
                });
                plan.result.repositories_created += 1;
            }
        }
    }

    let _ = now;

    for silver in existing_silver {
        let slug = silver.slug();
        let should_deactivate = !seen_slugs.contains(slug.as_str())
            && silver.catalogue_repository_id.is_some()
            && silver.ingestion_enabled;
        if should_deactivate {
            plan.steps.push(SyncStep::Deactivate {
                silver_id: silver.id.clone(),
            });
            plan.result.repositories_deactivated += 1;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn catalogue_repo(id: &str, owner: &str, name: &str) -> RepositoryRecord {
        RepositoryRecord {
            id: id.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            default_branch: "main".to_string(),
            documentation_paths: Vec::new(),
            is_active: true,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn creates_new_repositories_not_yet_in_silver() {
        let mut repos = HashMap::new();
        repos.insert("org/repo".to_string(), catalogue_repo("r1", "org", "repo"));
        let plan = plan_sync("estate", "e1", &repos, &[], now());
        assert_eq!(plan.result.repositories_created, 1);
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn ad_hoc_silver_rows_are_never_touched() {
        let ad_hoc = SilverRepository {
            id: "s1".to_string(),
            owner: "org".to_string(),
            name: "ad-hoc".to_string(),
            default_branch: "main".to_string(),
            estate_id: None,
            catalogue_repository_id: None,
            ingestion_enabled: true,
            documentation_paths: Vec::new(),
            last_synced_at: now(),
        };
        let plan = plan_sync("estate", "e1", &HashMap::new(), &[ad_hoc], now());
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn removed_catalogue_repo_deactivates_its_silver_row() {
        let silver = SilverRepository {
            id: "s1".to_string(),
            owner: "org".to_string(),
            name: "repo".to_string(),
            default_branch: "main".to_string(),
            estate_id: Some("e1".to_string()),
            catalogue_repository_id: Some("r1".to_string()),
            ingestion_enabled: true,
            documentation_paths: Vec::new(),
            last_synced_at: now(),
        };
        let plan = plan_sync("estate", "e1", &HashMap::new(), &[silver], now());
        assert_eq!(plan.result.repositories_deactivated, 1);
        assert!(matches!(plan.steps[0], SyncStep::Deactivate { .. }));
    }

    #[test]
    fn already_deactivated_row_is_not_recounted() {
        let silver = SilverRepository {
            id: "s1".to_string(),
            owner: "org".to_string(),
            name: "repo".to_string(),
            default_branch: "main".to_string(),
            estate_id: Some("e1".to_string()),
            catalogue_repository_id: Some("r1".to_string()),
            ingestion_enabled: false,
            documentation_paths: Vec::new(),
            last_synced_at: now(),
        };
        let plan = plan_sync("estate", "e1", &HashMap::new(), &[silver], now());
        assert_eq!(plan.result.repositories_deactivated, 0);
    }
}
