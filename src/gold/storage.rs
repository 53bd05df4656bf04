//! Postgres-backed storage for Report / ReportCoverage / ReportProject /
//! ReportReview (§3 Gold entities), owned exclusively by the reporting
//! orchestrator (C7).

#![cfg(feature = "database")]

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::models::{MachineSummary, Report, ReportReview, ReportScope, ReviewState};

#[derive(Clone)]
pub struct GoldStorage {
    pool: PgPool,
}

impl GoldStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_report(&self, tx: &mut Transaction<'_, Postgres>, report: &Report) -> Result<(), sqlx::Error> {
        let machine_summary = serde_json::to_value(&report.machine_summary).unwrap_or(serde_json::Value::Null);
        sqlx::query(
            r#"INSERT INTO reports
               (id, scope, repository_id, project_id, estate_id, window_start, window_end, generated_at,
                model_identifier, human_text, machine_summary, latency_ms, prompt_tokens, completion_tokens, total_tokens)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(&report.id)
        .bind(report.scope.as_str())
        .bind(&report.repository_id)
        .bind(&report.project_id)
        .bind(&report.estate_id)
        .bind(report.window_start)
        .bind(report.window_end)
        .bind(report.generated_at)
        .bind(&report.model_identifier)
        .bind(&report.human_text)
        .bind(machine_summary)
        .bind(report.latency_ms)
        .bind(report.prompt_tokens)
        .bind(report.completion_tokens)
        .bind(report.total_tokens)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn insert_coverage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        report_id: &str,
        event_fact_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        for event_fact_id in event_fact_ids {
            sqlx::query(
                "INSERT INTO report_coverage (report_id, event_fact_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(report_id)
            .bind(event_fact_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Upsert the pending review marker for `(repository_id, window_start,
    /// window_end)`. Relies on a partial unique index over pending rows
    /// to enforce "at most one pending marker per triple" without a
    /// pre-check.
    pub async fn upsert_pending_review(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        repository_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        attempt_count: u32,
        issues: &[String],
    ) -> Result<String, sqlx::Error> {
        let issues_json = serde_json::to_value(issues).unwrap_or(serde_json::Value::Null);
        let row = sqlx::query(
            r#"INSERT INTO report_reviews
               (id, repository_id, window_start, window_end, state, attempt_count, issues, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 'pending', $5, $6, now(), now())
               ON CONFLICT (repository_id, window_start, window_end) WHERE state = 'pending'
               DO UPDATE SET attempt_count = EXCLUDED.attempt_count, issues = EXCLUDED.issues, updated_at = now()
               RETURNING id"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(repository_id)
        .bind(window_start)
        .bind(window_end)
        .bind(attempt_count as i32)
        .bind(issues_json)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.get("id"))
    }

    pub async fn find_review(&self, review_id: &str) -> Result<Option<ReportReview>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, repository_id, window_start, window_end, state, attempt_count, issues, created_at, updated_at
             FROM report_reviews WHERE id = $1",
        )
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_review))
    }

    pub async fn latest_repository_report(
        &self,
        repository_id: &str,
    ) -> Result<Option<Report>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT id, scope, repository_id, project_id, estate_id, window_start, window_end, generated_at,
                      model_identifier, human_text, machine_summary, latency_ms, prompt_tokens, completion_tokens, total_tokens
               FROM reports
               WHERE scope = 'repository' AND repository_id = $1
               ORDER BY generated_at DESC
               LIMIT 1"#,
        )
        .bind(repository_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_report))
    }
}

fn row_to_review(row: sqlx::postgres::PgRow) -> ReportReview {
    let state: String = row.get("state");
    let issues: serde_json::Value = row.get("issues");
    ReportReview {
        id: row.get("id"),
        repository_id: row.get("repository_id"),
        window_start: row.get("window_start"),
        window_end: row.get("window_end"),
        state: parse_review_state(&state),
        attempt_count: row.get::<i32, _>("attempt_count") as u32,
        issues: issues
            .as_array()
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_report(row: sqlx::postgres::PgRow) -> Report {
    let scope: String = row.get("scope");
    let machine_summary: serde_json::Value = row.get("machine_summary");
    Report {
        id: row.get("id"),
        scope: parse_scope(&scope),
        repository_id: row.get("repository_id"),
        project_id: row.get("project_id"),
        estate_id: row.get("estate_id"),
        window_start: row.get("window_start"),
        window_end: row.get("window_end"),
        generated_at: row.get("generated_at"),
        model_identifier: row.get("model_identifier"),
        human_text: row.get("human_text"),
        machine_summary: serde_json::from_value(machine_summary).unwrap_or(MachineSummary {
            status: "unknown".to_string(),
            summary: String::new(),
            highlights: vec![],
            risks: vec![],
            next_steps: vec![],
        }),
        latency_ms: row.get("latency_ms"),
        prompt_tokens: row.get("prompt_tokens"),
        completion_tokens: row.get("completion_tokens"),
        total_tokens: row.get("total_tokens"),
    }
}

fn parse_scope(s: &str) -> ReportScope {
    match s {
        "project" => ReportScope::Project,
        "estate" => ReportScope::Estate,
        _ => ReportScope::Repository,
    }
}

fn parse_review_state(s: &str) -> ReviewState {
    match s {
        "resolved" => ReviewState::Resolved,
        "dismissed" => ReviewState::Dismissed,
        _ => ReviewState::Pending,
    }
}
