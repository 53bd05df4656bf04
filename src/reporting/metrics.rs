//! Operator-facing cost/latency metrics over Gold-layer reports.
//! Supplements the reporting orchestrator with a read path for
//! dashboards and cost review, not part of the report-generation flow
//! itself.

use chrono::{DateTime, Utc};

/// One report's raw latency/token counters, nullable per column the
/// way the underlying report row stores them.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRow {
    pub latency_ms: Option<i64>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
}

/// Aggregate reporting metrics for an operator-defined period.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingMetricsSnapshot {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_reports: usize,
    pub reports_with_metrics: usize,
    pub avg_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
    pub total_prompt_tokens: i64,
    pub total_completion_tokens: i64,
    pub total_tokens: i64,
}

/// Nearest-rank p95 over integer millisecond latencies.
fn compute_p95(latencies_ms: &[i64]) -> Option<f64> {
    if latencies_ms.is_empty() {
        return None;
    }
    let mut ordered = latencies_ms.to_vec();
    ordered.sort_unstable();
    let index = ((0.95 * ordered.len() as f64).ceil() as usize).saturating_sub(1);
    Some(ordered[index.min(ordered.len() - 1)] as f64)
}

fn count_reports_with_metrics(rows: &[MetricsRow]) -> usize {
    rows.iter()
        .filter(|row| {
            row.latency_ms.is_some()
                || row.prompt_tokens.is_some()
                || row.completion_tokens.is_some()
                || row.total_tokens.is_some()
        })
        .count()
}

fn compute_latency_stats(rows: &[MetricsRow]) -> (Option<f64>, Option<f64>) {
    let latencies: Vec<i64> = rows.iter().filter_map(|row| row.latency_ms).collect();
    let avg = if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<i64>() as f64 / latencies.len() as f64)
    };
    (avg, compute_p95(&latencies))
}

fn compute_token_totals(rows: &[MetricsRow]) -> (i64, i64, i64) {
    let prompt = rows.iter().filter_map(|row| row.prompt_tokens).sum();
    let completion = rows.iter().filter_map(|row| row.completion_tokens).sum();
    let total = rows.iter().filter_map(|row| row.total_tokens).sum();
    (prompt, completion, total)
}

/// Build a snapshot from per-report metrics rows already fetched for
/// the selected scope and period.
pub fn snapshot_from_rows(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    rows: &[MetricsRow],
) -> ReportingMetricsSnapshot {
    let reports_with_metrics = count_reports_with_metrics(rows);
    let (avg_latency_ms, p95_latency_ms) = compute_latency_stats(rows);
    let (total_prompt_tokens, total_completion_tokens, total_tokens) = compute_token_totals(rows);

    ReportingMetricsSnapshot {
        period_start,
        period_end,
        total_reports: rows.len(),
        reports_with_metrics,
        avg_latency_ms,
        p95_latency_ms,
        total_prompt_tokens,
        total_completion_tokens,
        total_tokens,
    }
}

#[cfg(feature = "database")]
pub mod executor {
    use chrono::{DateTime, Utc};
    use sqlx::{PgPool, Row};

    use super::{snapshot_from_rows, MetricsRow, ReportingMetricsSnapshot};

    #[derive(Clone)]
    pub struct ReportingMetricsService {
        pool: PgPool,
    }

    impl ReportingMetricsService {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }

        pub async fn get_metrics_for_period(
            &self,
            period_start: DateTime<Utc>,
            period_end: DateTime<Utc>,
        ) -> Result<ReportingMetricsSnapshot, sqlx::Error> {
            let rows = self.fetch_rows(period_start, period_end, None).await?;
            Ok(snapshot_from_rows(period_start, period_end, &rows))
        }

        pub async fn get_metrics_for_estate(
            &self,
            estate_id: &str,
            period_start: DateTime<Utc>,
            period_end: DateTime<Utc>,
        ) -> Result<ReportingMetricsSnapshot, sqlx::Error> {
            let rows = self.fetch_rows(period_start, period_end, Some(estate_id)).await?;
            Ok(snapshot_from_rows(period_start, period_end, &rows))
        }

        async fn fetch_rows(
            &self,
            period_start: DateTime<Utc>,
            period_end: DateTime<Utc>,
            estate_id: Option<&str>,
        ) -> Result<Vec<MetricsRow>, sqlx::Error> {
            let rows = match estate_id {
                None => {
                    sqlx::query(
                        r#"SELECT latency_ms, prompt_tokens, completion_tokens, total_tokens
                           FROM reports
                           WHERE scope = 'repository' AND generated_at >= $1 AND generated_at < $2"#,
                    )
                    .bind(period_start)
                    .bind(period_end)
                    .fetch_all(&self.pool)
                    .await?
                }
                Some(estate_id) => {
                    sqlx::query(
                        r#"SELECT r.latency_ms, r.prompt_tokens, r.completion_tokens, r.total_tokens
                           FROM reports r
                           JOIN silver_repositories sr ON sr.id = r.repository_id
                           WHERE r.scope = 'repository' AND r.generated_at >= $1 AND r.generated_at < $2
                             AND sr.estate_id = $3"#,
                    )
                    .bind(period_start)
                    .bind(period_end)
                    .bind(estate_id)
                    .fetch_all(&self.pool)
                    .await?
                }
            };

            Ok(rows
                .iter()
                .map(|row| MetricsRow {
                    latency_ms: row.get("latency_ms"),
                    prompt_tokens: row.get("prompt_tokens"),
                    completion_tokens: row.get("completion_tokens"),
                    total_tokens: row.get("total_tokens"),
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn period() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn empty_rows_yield_no_latency_stats() {
        let (start, end) = period();
        let snapshot = snapshot_from_rows(start, end, &[]);
        assert_eq!(snapshot.total_reports, 0);
        assert_eq!(snapshot.avg_latency_ms, None);
        assert_eq!(snapshot.p95_latency_ms, None);
    }

    #[test]
    fn p95_uses_nearest_rank() {
        let rows: Vec<MetricsRow> = (1..=20)
            .map(|ms| MetricsRow {
                latency_ms: Some(ms * 10),
                ..Default::default()
            })
            .collect();
        let (start, end) = period();
        let snapshot = snapshot_from_rows(start, end, &rows);
        assert_eq!(snapshot.p95_latency_ms, Some(190.0));
    }

    #[test]
    fn token_totals_treat_nulls_as_zero() {
        let rows = vec![
            MetricsRow {
                prompt_tokens: Some(100),
                total_tokens: Some(150),
                ..Default::default()
            },
            MetricsRow::default(),
        ];
        let (start, end) = period();
        let snapshot = snapshot_from_rows(start, end, &rows);
        assert_eq!(snapshot.total_prompt_tokens, 100);
        assert_eq!(snapshot.total_completion_tokens, 0);
        assert_eq!(snapshot.total_tokens, 150);
    }

    #[test]
    fn reports_with_metrics_counts_any_non_null_field() {
        let rows = vec![
            MetricsRow {
                completion_tokens: Some(5),
                ..Default::default()
            },
            MetricsRow::default(),
        ];
        let (start, end) = period();
        let snapshot = snapshot_from_rows(start, end, &rows);
        assert_eq!(snapshot.reports_with_metrics, 1);
    }
}
