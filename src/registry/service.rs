//! Registry synchroniser public operations (C4), DB-backed.

#![cfg(feature = "database")]

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info};

use super::errors::{NegativePaginationError, RegistryError, RepositoryNotFoundError};
use super::models::{parse_slug, RepositoryInfo, RepositoryListOptions, SyncResult};
use super::storage::{sync_error, RegistryStorage};
use super::sync::plan_sync;

#[derive(Clone)]
pub struct RegistryService {
    storage: RegistryStorage,
}

impl RegistryService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            storage: RegistryStorage::new(pool),
        }
    }

    /// `syncFromCatalogue` (§4.3): pre-load may happen outside the
    /// write transaction, but the write phase is always one
    /// transaction.
    pub async fn sync_from_catalogue(&self, estate_key: &str) -> Result<SyncResult, RegistryError> {
        let loaded = self
            .storage
            .load_catalogue_repositories(estate_key)
            .await
            .map_err(|_| sync_error(estate_key, "database error during sync"))?;
        let Some((catalogue_repos, estate_id)) = loaded else {
            return Err(sync_error(estate_key, "estate not found").into());
        };

        let mut tx = self.storage.pool().begin().await?;
        let existing_silver = self
            .storage
            .load_silver_repositories_for_estate(&mut tx, &estate_id)
            .await?;

        let plan = plan_sync(estate_key, &estate_id, &catalogue_repos, &existing_silver, Utc::now());
        self.storage.apply_sync_steps(&mut tx, &plan.steps).await?;
        tx.commit().await?;

        info!(
            estate = estate_key,
            created = plan.result.repositories_created,
            updated = plan.result.repositories_updated,
            deactivated = plan.result.repositories_deactivated,
            "registry sync complete"
        );
        Ok(plan.result)
    }

    pub async fn enable_ingestion(&self, owner: &str, name: &str) -> Result<bool, RegistryError> {
        self.set_ingestion(owner, name, true).await
    }

    pub async fn disable_ingestion(&self, owner: &str, name: &str) -> Result<bool, RegistryError> {
        self.set_ingestion(owner, name, false).await
    }

    async fn set_ingestion(&self, owner: &str, name: &str, enabled: bool) -> Result<bool, RegistryError> {
        if self.storage.find_by_owner_name(owner, name).await?.is_none() {
            return Err(RepositoryNotFoundError {
                slug: format!("{owner}/{name}"),
            }
            .into());
        }
        let changed = self.storage.set_ingestion_enabled(owner, name, enabled).await?;
        debug!(owner, name, enabled, changed, "ingestion toggle applied");
        Ok(changed)
    }

    pub async fn list_active_repositories(
        &self,
        estate_id: Option<String>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RepositoryInfo>, RegistryError> {
        self.list_repositories(RepositoryListOptions {
            estate_id,
            ingestion_enabled: Some(true),
            limit,
            offset,
        })
        .await
    }

    pub async fn list_all_repositories(
        &self,
        estate_id: Option<String>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RepositoryInfo>, RegistryError> {
        self.list_repositories(RepositoryListOptions {
            estate_id,
            ingestion_enabled: None,
            limit,
            offset,
        })
        .await
    }

    async fn list_repositories(
        &self,
        options: RepositoryListOptions,
    ) -> Result<Vec<RepositoryInfo>, RegistryError> {
        if let Some(limit) = options.limit {
            if limit < 0 {
                return Err(NegativePaginationError { parameter: "limit" }.into());
            }
        }
        if let Some(offset) = options.offset {
            if offset < 0 {
                return Err(NegativePaginationError { parameter: "offset" }.into());
            }
        }
        Ok(self.storage.list(&options).await?)
    }

    /// Malformed slugs (not exactly one `/`, empty segments) return
    /// `Ok(None)` without hitting the database.
    pub async fn get_repository_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<RepositoryInfo>, RegistryError> {
        let Some((owner, name)) = parse_slug(slug) else {
            return Ok(None);
        };
        Ok(self.storage.find_by_owner_name(owner, name).await?)
    }
}
