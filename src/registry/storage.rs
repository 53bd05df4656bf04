//! Postgres-backed storage for the registry synchroniser (C4).

#![cfg(feature = "database")]

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::catalogue::records::RepositoryRecord;

use super::errors::RegistrySyncError;
use super::models::{RepositoryInfo, RepositoryListOptions, SilverRepository};

#[derive(Clone)]
pub struct RegistryStorage {
    pool: PgPool,
}

impl RegistryStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load every catalogue repository reachable from `estate_key`, and
    /// the estate's id. Returns `None` if the estate doesn't exist.
    pub async fn load_catalogue_repositories(
        &self,
        estate_key: &str,
    ) -> Result<Option<(HashMap<String, RepositoryRecord>, String)>, sqlx::Error> {
        let estate_row = sqlx::query("SELECT id FROM estates WHERE key = $1")
            .bind(estate_key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(estate_row) = estate_row else {
            return Ok(None);
        };
        let estate_id: String = estate_row.get("id");

        let rows = sqlx::query(
            r#"SELECT DISTINCT r.id, r.owner, r.name, r.default_branch, r.documentation_paths
               FROM repository_records r
               JOIN component_records c ON c.repository_id = r.id
               JOIN project_records p ON p.id = c.project_id
               WHERE p.estate_id = $1"#,
        )
        .bind(&estate_id)
        .fetch_all(&self.pool)
        .await?;

        let mut repos = HashMap::new();
        for row in rows {
            let record = RepositoryRecord {
                id: row.get("id"),
                owner: row.get("owner"),
                name: row.get("name"),
                default_branch: row.get("default_branch"),
                documentation_paths: row.get("documentation_paths"),
                is_active: true,
            };
            repos.insert(record.slug(), record);
        }
        Ok(Some((repos, estate_id)))
    }

    pub async fn load_silver_repositories_for_estate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        estate_id: &str,
    ) -> Result<Vec<SilverRepository>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT id, owner, name, default_branch, estate_id, catalogue_repository_id,
                      ingestion_enabled, documentation_paths, last_synced_at
               FROM silver_repositories
               WHERE estate_id = $1 OR estate_id IS NULL"#,
        )
        .bind(estate_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows.iter().map(row_to_silver_repository).collect())
    }

    pub async fn apply_sync_steps(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        steps: &[super::sync::SyncStep],
    ) -> Result<(), sqlx::Error> {
        use super::sync::SyncStep;
        for step in steps {
            match step {
                SyncStep::Create { catalogue_repo } => {
                    sqlx::query(
                        r#"INSERT INTO silver_repositories
                           (id, owner, name, default_branch, estate_id, catalogue_repository_id, ingestion_enabled, documentation_paths, last_synced_at)
                           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())"#,
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(&catalogue_repo.owner)
                    .bind(&catalogue_repo.name)
                    .bind(&catalogue_repo.default_branch)
                    .bind(&catalogue_repo.id)
                    .bind(&catalogue_repo.id)
                    .bind(catalogue_repo.is_active)
                    .bind(&catalogue_repo.documentation_paths)
                    .execute(&mut **tx)
                    .await?;
                }
                SyncStep::Update {
                    silver_id,
                    default_branch,
                    estate_id,
                    catalogue_repository_id,
                    ingestion_enabled,
                    documentation_paths,
                } => {
                    sqlx::query(
                        r#"UPDATE silver_repositories
                           SET default_branch = $1, estate_id = $2, catalogue_repository_id = $3,
                               ingestion_enabled = $4, documentation_paths = $5, last_synced_at = now()
                           WHERE id = $6"#,
                    )
                    .bind(default_branch)
                    .bind(estate_id)
                    .bind(catalogue_repository_id)
                    .bind(ingestion_enabled)
                    .bind(documentation_paths)
                    .bind(silver_id)
                    .execute(&mut **tx)
                    .await?;
                }
                SyncStep::Deactivate { silver_id } => {
                    sqlx::query(
                        "UPDATE silver_repositories SET ingestion_enabled = false, last_synced_at = now() WHERE id = $1",
                    )
                    .bind(silver_id)
                    .execute(&mut **tx)
                    .await?;
                }
            }
        }
        Ok(())
    }

    pub async fn set_ingestion_enabled(
        &self,
        owner: &str,
        name: &str,
        enabled: bool,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT id, ingestion_enabled FROM silver_repositories WHERE owner = $1 AND name = $2",
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(false);
        };
        let current: bool = row.get("ingestion_enabled");
        if current == enabled {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query("UPDATE silver_repositories SET ingestion_enabled = $1 WHERE id = $2")
            .bind(enabled)
            .bind(row.get::<String, _>("id"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn find_by_owner_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<RepositoryInfo>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT id, owner, name, default_branch, ingestion_enabled, documentation_paths, estate_id
               FROM silver_repositories WHERE owner = $1 AND name = $2"#,
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| RepositoryInfo {
            id: r.get("id"),
            owner: r.get("owner"),
            name: r.get("name"),
            default_branch: r.get("default_branch"),
            ingestion_enabled: r.get("ingestion_enabled"),
            documentation_paths: r.get("documentation_paths"),
            estate_id: r.get("estate_id"),
        }))
    }

    pub async fn list(
        &self,
        options: &RepositoryListOptions,
    ) -> Result<Vec<RepositoryInfo>, sqlx::Error> {
        let limit = options.limit.unwrap_or(i64::MAX);
        let offset = options.offset.unwrap_or(0);
        let rows = sqlx::query(
            r#"SELECT id, owner, name, default_branch, ingestion_enabled, documentation_paths, estate_id
               FROM silver_repositories
               WHERE ($1::text IS NULL OR estate_id = $1)
                 AND ($2::boolean IS NULL OR ingestion_enabled = $2)
               ORDER BY owner, name
               LIMIT $3 OFFSET $4"#,
        )
        .bind(&options.estate_id)
        .bind(options.ingestion_enabled)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| RepositoryInfo {
                id: r.get("id"),
                owner: r.get("owner"),
                name: r.get("name"),
                default_branch: r.get("default_branch"),
                ingestion_enabled: r.get("ingestion_enabled"),
                documentation_paths: r.get("documentation_paths"),
                estate_id: r.get("estate_id"),
            })
            .collect())
    }
}

fn row_to_silver_repository(row: &sqlx::postgres::PgRow) -> SilverRepository {
    SilverRepository {
        id: row.get("id"),
        owner: row.get("owner"),
        name: row.get("name"),
        default_branch: row.get("default_branch"),
        estate_id: row.get("estate_id"),
        catalogue_repository_id: row.get("catalogue_repository_id"),
        ingestion_enabled: row.get("ingestion_enabled"),
        documentation_paths: row.get("documentation_paths"),
        last_synced_at: row.get("last_synced_at"),
    }
}

pub fn sync_error(estate_key: &str, reason: impl Into<String>) -> RegistrySyncError {
    RegistrySyncError {
        estate_key: estate_key.to_string(),
        reason: reason.into(),
    }
}
