//! End-to-end coverage of the reporting orchestrator (C7) against a
//! real Postgres instance.

#![cfg(feature = "database")]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use ghillie::evidence::{RepositoryEvidenceBundle, RepositoryEvidenceService};
use ghillie::gold::GoldStorage;
use ghillie::reporting::{InvocationMetrics, ReportingService, StatusModel, StatusModelError, StatusResult};

struct TestDb {
    pool: PgPool,
    prefix: String,
}

impl TestDb {
    async fn new() -> Result<Self> {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "postgresql:///ghillie_test".into());
        let pool = PgPool::connect(&url).await?;
        let prefix = format!("rstest_{}", &Uuid::new_v4().to_string()[..8]);
        Ok(Self { pool, prefix })
    }

    fn id(&self, base: &str) -> String {
        format!("{}_{}", self.prefix, base)
    }

    async fn seed_repository(&self, estate_id: &str) -> Result<String> {
        let repo_id = self.id("repo");
        sqlx::query(
            r#"INSERT INTO silver_repositories (id, owner, name, default_branch, estate_id, ingestion_enabled)
               VALUES ($1, 'acme', $2, 'main', $3, true)"#,
        )
        .bind(&repo_id)
        .bind(self.id("widget"))
        .bind(estate_id)
        .execute(&self.pool)
        .await?;
        Ok(repo_id)
    }

    async fn seed_estate(&self) -> Result<String> {
        let estate_id = self.id("estate");
        sqlx::query("INSERT INTO estates (id, key, name) VALUES ($1, $2, 'Test Estate')")
            .bind(&estate_id)
            .bind(self.id("estate-key"))
            .execute(&self.pool)
            .await?;
        Ok(estate_id)
    }

    async fn seed_commit(&self, repo_id: &str, committed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO commits (sha, repo_id, message, committed_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(repo_id)
        .bind("feat: add widget search")
        .bind(committed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let pattern = format!("{}%", self.prefix);
        sqlx::query("DELETE FROM report_reviews WHERE repository_id LIKE $1")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM report_coverage WHERE report_id IN (SELECT id FROM reports WHERE repository_id LIKE $1)")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM reports WHERE repository_id LIKE $1")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM commits WHERE repo_id LIKE $1")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM silver_repositories WHERE id LIKE $1")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM estates WHERE id LIKE $1")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// A status model whose responses are scripted per call, used to
/// exercise the validate-and-retry loop deterministically.
struct ScriptedStatusModel {
    responses: Mutex<Vec<Result<StatusResult, ()>>>,
    invocation_count: Mutex<u32>,
}

impl ScriptedStatusModel {
    fn new(responses: Vec<Result<StatusResult, ()>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            invocation_count: Mutex::new(0),
        }
    }

    fn invocations(&self) -> u32 {
        *self.invocation_count.lock().unwrap()
    }
}

fn empty_status_result() -> StatusResult {
    StatusResult {
        status: "on_track".to_string(),
        summary: String::new(),
        highlights: vec![],
        risks: vec![],
        next_steps: vec![],
    }
}

#[async_trait]
impl StatusModel for ScriptedStatusModel {
    async fn summarize_repository(&self, _bundle: &RepositoryEvidenceBundle) -> Result<StatusResult, StatusModelError> {
        *self.invocation_count.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        match responses.pop() {
            Some(Ok(result)) => Ok(result),
            _ => Ok(empty_status_result()),
        }
    }

    fn model_id(&self) -> String {
        "scripted-test-model".to_string()
    }

    fn last_invocation_metrics(&self) -> Option<InvocationMetrics> {
        Some(InvocationMetrics {
            latency_ms: Some(5),
            prompt_tokens: Some(10),
            completion_tokens: Some(20),
            total_tokens: Some(30),
        })
    }
}

fn build_service(db: &TestDb, status_model: Arc<dyn StatusModel>) -> ReportingService {
    ReportingService::new(
        db.pool.clone(),
        RepositoryEvidenceService::new(db.pool.clone(), 5),
        GoldStorage::new(db.pool.clone()),
        status_model,
        None,
        7,
        2,
        10,
    )
}

#[tokio::test]
async fn skip_on_empty_window_writes_nothing() -> Result<()> {
    let db = TestDb::new().await?;
    let estate_id = db.seed_estate().await?;
    let repo_id = db.seed_repository(&estate_id).await?;

    let status_model = Arc::new(ScriptedStatusModel::new(vec![]));
    let service = build_service(&db, status_model.clone());

    let as_of = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
    let report = service.run_for_repository(&repo_id, Some(as_of)).await?;

    assert!(report.is_none());
    assert_eq!(status_model.invocations(), 0);

    db.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn retry_then_succeed_invokes_model_twice_and_persists_once() -> Result<()> {
    let db = TestDb::new().await?;
    let estate_id = db.seed_estate().await?;
    let repo_id = db.seed_repository(&estate_id).await?;
    db.seed_commit(&repo_id, Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap())
        .await?;

    let valid_result = StatusResult {
        status: "on_track".to_string(),
        summary: "Shipped widget search.".to_string(),
        highlights: vec![],
        risks: vec![],
        next_steps: vec![],
    };
    // ScriptedStatusModel.pop()s from the end, so push in reverse call order.
    let status_model = Arc::new(ScriptedStatusModel::new(vec![Ok(valid_result.clone()), Ok(empty_status_result())]));
    let service = build_service(&db, status_model.clone());

    let as_of = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
    let report = service.run_for_repository(&repo_id, Some(as_of)).await?;

    let report = report.expect("events exist, a report should be produced");
    assert_eq!(report.human_text.as_deref(), Some("Shipped widget search."));
    assert_eq!(status_model.invocations(), 2);

    let review_count: i64 = sqlx::query("SELECT count(*) AS c FROM report_reviews WHERE repository_id = $1")
        .bind(&repo_id)
        .fetch_one(&db.pool)
        .await?
        .get("c");
    assert_eq!(review_count, 0);

    db.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_create_a_pending_review_and_no_report() -> Result<()> {
    let db = TestDb::new().await?;
    let estate_id = db.seed_estate().await?;
    let repo_id = db.seed_repository(&estate_id).await?;
    db.seed_commit(&repo_id, Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap())
        .await?;

    let status_model = Arc::new(ScriptedStatusModel::new(vec![]));
    let service = build_service(&db, status_model.clone());

    let as_of = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
    let window = service.compute_next_window(&repo_id, Some(as_of)).await?;
    let result = service.generate_report(&repo_id, window.start, window.end, None).await;

    assert!(result.is_err());
    assert_eq!(status_model.invocations(), 2);

    let review_row = sqlx::query(
        "SELECT state, attempt_count FROM report_reviews WHERE repository_id = $1",
    )
    .bind(&repo_id)
    .fetch_one(&db.pool)
    .await?;
    let state: String = review_row.get("state");
    let attempt_count: i32 = review_row.get("attempt_count");
    assert_eq!(state, "pending");
    assert_eq!(attempt_count, 2);

    let report_count: i64 = sqlx::query("SELECT count(*) AS c FROM reports WHERE repository_id = $1")
        .bind(&repo_id)
        .fetch_one(&db.pool)
        .await?
        .get("c");
    assert_eq!(report_count, 0);

    db.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn window_contiguity_across_successive_reports() -> Result<()> {
    let db = TestDb::new().await?;
    let estate_id = db.seed_estate().await?;
    let repo_id = db.seed_repository(&estate_id).await?;
    db.seed_commit(&repo_id, Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap())
        .await?;

    let status_model = Arc::new(ScriptedStatusModel::new(vec![Ok(StatusResult {
        status: "on_track".to_string(),
        summary: "first window".to_string(),
        highlights: vec![],
        risks: vec![],
        next_steps: vec![],
    })]));
    let service = build_service(&db, status_model);

    let first_as_of = Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap();
    let first_report = service
        .run_for_repository(&repo_id, Some(first_as_of))
        .await?
        .expect("first window has events");

    let second_as_of = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
    let second_window = service.compute_next_window(&repo_id, Some(second_as_of)).await?;

    assert_eq!(second_window.start, first_report.window_end);
    assert_eq!(second_window.end, second_as_of);

    db.cleanup().await?;
    Ok(())
}
