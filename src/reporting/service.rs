//! Reporting orchestrator (C7): the other hard core. Computes
//! reporting windows, builds evidence bundles, invokes the status
//! model with validate-and-retry, and persists reports.

use chrono::{DateTime, Utc};

/// Time window for a repository report: `start` inclusive, `end`
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(feature = "database")]
pub mod executor {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Instant;

    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use sqlx::{PgPool, Row};
    use tokio::sync::Semaphore;
    use tracing::warn;
    use uuid::Uuid;

    use crate::evidence::{EvidenceError, RepositoryEvidenceBundle, RepositoryEvidenceService};
    use crate::gold::{GoldStorage, MachineSummary, Report, ReportScope};

    use super::super::config::ReportingConfig;
    use super::super::errors::{EstateReportError, ReportValidationError, ReportingError};
    use super::super::markdown::render_report_markdown;
    use super::super::sink::{ReportMetadata, ReportSink};
    use super::super::status::StatusModel;
    use super::super::validation;
    use super::ReportingWindow;

    /// Orchestrates repository status report generation end to end.
    pub struct ReportingService {
        pool: PgPool,
        evidence_service: RepositoryEvidenceService,
        gold_storage: GoldStorage,
        status_model: Arc<dyn StatusModel>,
        sink: Option<Arc<dyn ReportSink>>,
        window_days: i64,
        validation_max_attempts: u32,
        max_concurrent_reports: usize,
    }

    impl ReportingService {
        #[allow(clippy::too_many_arguments)]
        pub fn new(
            pool: PgPool,
            evidence_service: RepositoryEvidenceService,
            gold_storage: GoldStorage,
            status_model: Arc<dyn StatusModel>,
            sink: Option<Arc<dyn ReportSink>>,
            window_days: i64,
            validation_max_attempts: u32,
            max_concurrent_reports: usize,
        ) -> Self {
            Self {
                pool,
                evidence_service,
                gold_storage,
                status_model,
                sink,
                window_days,
                validation_max_attempts,
                max_concurrent_reports,
            }
        }

        /// Builds a service with its window/retry/concurrency knobs
        /// taken from `config` instead of passed individually.
        pub fn from_config(
            pool: PgPool,
            evidence_service: RepositoryEvidenceService,
            gold_storage: GoldStorage,
            status_model: Arc<dyn StatusModel>,
            sink: Option<Arc<dyn ReportSink>>,
            config: &ReportingConfig,
        ) -> Self {
            Self::new(
                pool,
                evidence_service,
                gold_storage,
                status_model,
                sink,
                config.window_days,
                config.validation_max_attempts,
                config.max_concurrent_reports,
            )
        }

        /// `start = min(end, previous.window_end)` when a previous
        /// repository-scope report exists (guards against a backdated
        /// `as_of` producing an inverted window), else `end -
        /// window_days`.
        pub async fn compute_next_window(
            &self,
            repository_id: &str,
            as_of: Option<DateTime<Utc>>,
        ) -> Result<ReportingWindow, sqlx::Error> {
            let end = as_of.unwrap_or_else(Utc::now);
            let previous = self.gold_storage.latest_repository_report(repository_id).await?;
            let start = match previous {
                Some(report) => end.min(report.window_end),
                None => end - ChronoDuration::days(self.window_days),
            };
            Ok(ReportingWindow { start, end })
        }

        /// Builds (or accepts) an evidence bundle, invokes the status
        /// model up to `validation_max_attempts` times, and persists
        /// the result. On exhausted retries, upserts a pending review
        /// marker and fails without persisting a Report row.
        pub async fn generate_report(
            &self,
            repository_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
            bundle: Option<RepositoryEvidenceBundle>,
        ) -> Result<Report, ReportingError> {
            if window_end <= window_start {
                return Err(crate::gold::ReportConstructionError::InvalidWindow(
                    crate::gold::InvalidWindowError {
                        window_start,
                        window_end,
                    },
                )
                .into());
            }

            let bundle = match bundle {
                Some(bundle) => bundle,
                None => {
                    self.evidence_service
                        .build_bundle(repository_id, window_start, window_end)
                        .await?
                }
            };

            let mut last_issues: Vec<String> = Vec::new();
            let mut attempts: u32 = 0;
            let mut accepted = None;

            while attempts < self.validation_max_attempts {
                attempts += 1;
                let started = Instant::now();
                let result = self.status_model.summarize_repository(&bundle).await?;
                let latency_ms = started.elapsed().as_millis() as i64;
                let metrics = self.status_model.last_invocation_metrics();

                let issues = validation::validate(&result);
                if issues.is_empty() {
                    accepted = Some((result, latency_ms, metrics));
                    break;
                }
                last_issues = issues;
            }

            let (status_result, latency_ms, metrics) = match accepted {
                Some(accepted) => accepted,
                None => {
                    let mut tx = self.pool.begin().await?;
                    let review_id = self
                        .gold_storage
                        .upsert_pending_review(&mut tx, repository_id, window_start, window_end, attempts, &last_issues)
                        .await?;
                    tx.commit().await?;
                    return Err(ReportValidationError {
                        attempts,
                        issues: last_issues,
                        review_id,
                    }
                    .into());
                }
            };

            let machine_summary: MachineSummary = status_result.clone().into();
            let model_identifier = self.status_model.model_id();

            let mut tx = self.pool.begin().await?;
            let report = Report::new(
                Uuid::new_v4().to_string(),
                ReportScope::Repository,
                Some(repository_id.to_string()),
                None,
                None,
                window_start,
                window_end,
                Utc::now(),
                model_identifier,
                Some(status_result.summary.clone()),
                machine_summary,
                Some(latency_ms),
                metrics.and_then(|m| m.prompt_tokens),
                metrics.and_then(|m| m.completion_tokens),
                metrics.and_then(|m| m.total_tokens),
            )?;
            self.gold_storage.insert_report(&mut tx, &report).await?;
            self.gold_storage
                .insert_coverage(&mut tx, &report.id, &bundle.event_fact_ids)
                .await?;
            tx.commit().await?;

            if let Some(sink) = &self.sink {
                self.write_to_sink(sink.as_ref(), &report, repository_id).await;
            }

            Ok(report)
        }

        async fn write_to_sink(&self, sink: &dyn ReportSink, report: &Report, repository_id: &str) {
            let slug = match self.fetch_repository_slug(repository_id).await {
                Ok(Some(slug)) => slug,
                Ok(None) => {
                    warn!(repository_id, "repository missing at sink time, skipping write");
                    return;
                }
                Err(error) => {
                    warn!(repository_id, %error, "failed to look up repository for sink write");
                    return;
                }
            };
            let markdown = render_report_markdown(report, &slug.0, &slug.1);
            let metadata = ReportMetadata {
                owner: slug.0,
                name: slug.1,
                report_id: report.id.clone(),
                window_end: report.window_end.format("%Y-%m-%d").to_string(),
            };
            if let Err(error) = sink.write_report(&markdown, &metadata).await {
                warn!(repository_id, %error, "failed to write rendered report to sink");
            }
        }

        async fn fetch_repository_slug(&self, repository_id: &str) -> Result<Option<(String, String)>, sqlx::Error> {
            let row = sqlx::query("SELECT owner, name FROM silver_repositories WHERE id = $1")
                .bind(repository_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(|r| (r.get("owner"), r.get("name"))))
        }

        /// Computes the next window and generates a report, early-exiting
        /// with `None` when the bundle has no events worth reporting.
        pub async fn run_for_repository(
            &self,
            repository_id: &str,
            as_of: Option<DateTime<Utc>>,
        ) -> Result<Option<Report>, ReportingError> {
            let window = self.compute_next_window(repository_id, as_of).await?;
            let bundle = self
                .evidence_service
                .build_bundle(repository_id, window.start, window.end)
                .await?;

            if bundle.total_event_count() == 0 {
                return Ok(None);
            }

            let report = self
                .generate_report(repository_id, window.start, window.end, Some(bundle))
                .await?;
            Ok(Some(report))
        }

        /// Runs `run_for_repository` for every `ingestion_enabled`
        /// repository in the estate, bounded by a semaphore to protect
        /// the database connection pool. Individual failures are
        /// aggregated rather than aborting the rest of the estate.
        pub async fn run_for_estate(
            &self,
            estate_id: &str,
            as_of: Option<DateTime<Utc>>,
        ) -> Result<Vec<Option<Report>>, EstateReportError> {
            let repo_ids = self
                .fetch_enabled_repository_ids(estate_id)
                .await
                .map_err(|error| EstateReportError {
                    attempted: 0,
                    failures: vec![("<estate lookup>".to_string(), error.into())],
                })?;

            let semaphore = Arc::new(Semaphore::new(self.max_concurrent_reports));
            let mut futures: Vec<
                Pin<Box<dyn Future<Output = (String, Result<Option<Report>, ReportingError>)> + Send + '_>>,
            > = Vec::new();

            for repo_id in repo_ids.clone() {
                let semaphore = Arc::clone(&semaphore);
                let fut = async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    let result = self.run_for_repository(&repo_id, as_of).await;
                    (repo_id, result)
                };
                futures.push(Box::pin(fut));
            }

            let gathered = futures::future::join_all(futures).await;

            let mut successes = Vec::new();
            let mut failures = Vec::new();
            for (repo_id, result) in gathered {
                match result {
                    Ok(report) => successes.push(report),
                    Err(error) => failures.push((repo_id, error)),
                }
            }

            if !failures.is_empty() {
                return Err(EstateReportError {
                    attempted: repo_ids.len(),
                    failures,
                });
            }

            Ok(successes)
        }

        async fn fetch_enabled_repository_ids(&self, estate_id: &str) -> Result<Vec<String>, sqlx::Error> {
            let rows = sqlx::query(
                "SELECT id FROM silver_repositories WHERE estate_id = $1 AND ingestion_enabled = true",
            )
            .bind(estate_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.iter().map(|r| r.get("id")).collect())
        }
    }
}
