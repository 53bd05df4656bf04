//! Evidence assembler, repository scope (C5).

use chrono::{DateTime, Utc};

use super::models::{
    CommitEvidence, DocumentationEvidence, IssueEvidence, PullRequestEvidence, RepositoryEvidenceBundle,
    RepositoryMetadata, WorkType, WorkTypeGrouping,
};

const SAMPLE_TITLE_LIMIT: usize = 5;
const COMMIT_MESSAGE_TRUNCATE: usize = 100;

fn truncate(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Bucket commits/PRs/issues by work type, excluding merge commits,
/// and emit a grouping per work type actually observed.
pub fn compute_work_type_groupings(
    commits: &[CommitEvidence],
    pull_requests: &[PullRequestEvidence],
    issues: &[IssueEvidence],
) -> Vec<WorkTypeGrouping> {
    let mut buckets: Vec<(WorkType, usize, usize, usize, Vec<String>)> = WorkType::ALL
        .iter()
        .map(|wt| (*wt, 0usize, 0usize, 0usize, Vec::new()))
        .collect();

    let bucket_for = |buckets: &mut Vec<(WorkType, usize, usize, usize, Vec<String>)>, wt: WorkType| {
        buckets.iter_mut().find(|b| b.0 == wt).expect("all work types pre-seeded")
    };

    for commit in commits.iter().filter(|c| !c.is_merge_commit) {
        let entry = bucket_for(&mut buckets, commit.work_type);
        entry.1 += 1;
        if let Some(message) = &commit.message {
            entry.4.push(truncate(message, COMMIT_MESSAGE_TRUNCATE));
        }
    }
    for pr in pull_requests {
        let entry = bucket_for(&mut buckets, pr.work_type);
        entry.2 += 1;
        if let Some(title) = &pr.title {
            entry.4.push(title.clone());
        }
    }
    for issue in issues {
        let entry = bucket_for(&mut buckets, issue.work_type);
        entry.3 += 1;
        if let Some(title) = &issue.title {
            entry.4.push(title.clone());
        }
    }

    buckets
        .into_iter()
        .filter(|(_, commit_count, pr_count, issue_count, _)| *commit_count + *pr_count + *issue_count > 0)
        .map(|(work_type, commit_count, pr_count, issue_count, mut titles)| {
            titles.truncate(SAMPLE_TITLE_LIMIT);
            WorkTypeGrouping {
                work_type,
                commit_count,
                pr_count,
                issue_count,
                sample_titles: titles,
            }
        })
        .collect()
}

/// Assemble a bundle from already-fetched, already-classified evidence.
/// Pure: callers perform gathering and classification; this function
/// only computes groupings and stitches the bundle together.
#[allow(clippy::too_many_arguments)]
pub fn assemble_bundle(
    repository: RepositoryMetadata,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    previous_reports: Vec<super::models::PreviousReportSummary>,
    commits: Vec<CommitEvidence>,
    pull_requests: Vec<PullRequestEvidence>,
    issues: Vec<IssueEvidence>,
    documentation_changes: Vec<DocumentationEvidence>,
    event_fact_ids: Vec<i64>,
    generated_at: DateTime<Utc>,
) -> RepositoryEvidenceBundle {
    let work_type_groupings = compute_work_type_groupings(&commits, &pull_requests, &issues);
    RepositoryEvidenceBundle {
        repository,
        window_start,
        window_end,
        previous_reports,
        commits,
        pull_requests,
        issues,
        documentation_changes,
        work_type_groupings,
        event_fact_ids,
        generated_at,
    }
}

#[cfg(feature = "database")]
pub mod executor {
    use chrono::{DateTime, Utc};
    use sqlx::{PgPool, Row};

    use crate::evidence::classification::{
        classify_commit_default, classify_issue_default, classify_pull_request_default, is_merge_commit,
    };
    use crate::evidence::models::{
        CommitEvidence, DocumentationEvidence, IssueEvidence, PreviousReportSummary, PullRequestEvidence,
        ReportStatus, RepositoryEvidenceBundle, RepositoryMetadata,
    };

    use super::assemble_bundle;

    #[derive(Debug, thiserror::Error)]
    pub enum EvidenceError {
        #[error("repository not found: {0}")]
        RepositoryNotFound(String),
        #[error(transparent)]
        Database(#[from] sqlx::Error),
    }

    #[derive(Clone)]
    pub struct RepositoryEvidenceService {
        pool: PgPool,
        max_previous_reports: i64,
    }

    impl RepositoryEvidenceService {
        pub fn new(pool: PgPool, max_previous_reports: i64) -> Self {
            Self {
                pool,
                max_previous_reports,
            }
        }

        pub async fn build_bundle(
            &self,
            repository_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
        ) -> Result<RepositoryEvidenceBundle, EvidenceError> {
            let repo_row = sqlx::query(
                r#"SELECT id, owner, name, default_branch, estate_id, documentation_paths
                   FROM silver_repositories WHERE id = $1"#,
            )
            .bind(repository_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EvidenceError::RepositoryNotFound(repository_id.to_string()))?;

            let repository = RepositoryMetadata {
                id: repo_row.get("id"),
                owner: repo_row.get("owner"),
                name: repo_row.get("name"),
                default_branch: repo_row.get("default_branch"),
                estate_id: repo_row.get("estate_id"),
                documentation_paths: repo_row.get("documentation_paths"),
            };

            let previous_reports = self
                .fetch_previous_reports(repository_id, window_start)
                .await?;
            let commits = self.fetch_commits(repository_id, window_start, window_end).await?;
            let pull_requests = self
                .fetch_pull_requests(repository_id, window_start, window_end)
                .await?;
            let issues = self.fetch_issues(repository_id, window_start, window_end).await?;
            let documentation_changes = self
                .fetch_documentation_changes(repository_id, window_start, window_end)
                .await?;
            let event_fact_ids = self
                .fetch_event_fact_ids(&repository.slug(), window_start, window_end)
                .await?;

            Ok(assemble_bundle(
                repository,
                window_start,
                window_end,
                previous_reports,
                commits,
                pull_requests,
                issues,
                documentation_changes,
                event_fact_ids,
                Utc::now(),
            ))
        }

        async fn fetch_previous_reports(
            &self,
            repository_id: &str,
            before: DateTime<Utc>,
        ) -> Result<Vec<PreviousReportSummary>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT r.id, r.window_start, r.window_end, r.machine_summary,
                          (SELECT count(*) FROM report_coverage rc WHERE rc.report_id = r.id) AS event_count
                   FROM reports r
                   WHERE r.scope = 'repository' AND r.repository_id = $1 AND r.window_end <= $2
                   ORDER BY r.window_end DESC
                   LIMIT $3"#,
            )
            .bind(repository_id)
            .bind(before)
            .bind(self.max_previous_reports)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| {
                    let summary: serde_json::Value = row.get("machine_summary");
                    let status = ReportStatus::parse(summary.get("status").and_then(|v| v.as_str()));
                    let highlights = json_string_array(&summary, "highlights");
                    let risks = json_string_array(&summary, "risks");
                    PreviousReportSummary {
                        report_id: row.get("id"),
                        window_start: row.get("window_start"),
                        window_end: row.get("window_end"),
                        status,
                        highlights,
                        risks,
                        event_count: row.get::<i64, _>("event_count") as usize,
                    }
                })
                .collect())
        }

        async fn fetch_commits(
            &self,
            repository_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
        ) -> Result<Vec<CommitEvidence>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT sha, message, author_name, author_email, committed_at
                   FROM commits
                   WHERE repo_id = $1 AND committed_at >= $2 AND committed_at < $3
                   ORDER BY committed_at DESC"#,
            )
            .bind(repository_id)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| {
                    let message: Option<String> = row.get("message");
                    CommitEvidence {
                        sha: row.get("sha"),
                        message: message.clone(),
                        author_name: row.get("author_name"),
                        author_email: row.get("author_email"),
                        committed_at: row.get("committed_at"),
                        work_type: classify_commit_default(message.as_deref()),
                        is_merge_commit: is_merge_commit(message.as_deref()),
                    }
                })
                .collect())
        }

        async fn fetch_pull_requests(
            &self,
            repository_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
        ) -> Result<Vec<PullRequestEvidence>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT id, number, title, author_login, state, labels, created_at, merged_at, closed_at, is_draft
                   FROM pull_requests
                   WHERE repo_id = $1
                     AND ((created_at >= $2 AND created_at < $3)
                       OR (merged_at >= $2 AND merged_at < $3)
                       OR (closed_at >= $2 AND closed_at < $3))
                   ORDER BY created_at DESC"#,
            )
            .bind(repository_id)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| {
                    let title: Option<String> = row.get("title");
                    let labels: Vec<String> = row.get("labels");
                    PullRequestEvidence {
                        id: row.get("id"),
                        number: row.get("number"),
                        title: title.clone(),
                        author_login: row.get("author_login"),
                        state: row.get("state"),
                        labels: labels.clone(),
                        created_at: row.get("created_at"),
                        merged_at: row.get("merged_at"),
                        closed_at: row.get("closed_at"),
                        work_type: classify_pull_request_default(&labels, title.as_deref()),
                        is_draft: row.get("is_draft"),
                    }
                })
                .collect())
        }

        async fn fetch_issues(
            &self,
            repository_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
        ) -> Result<Vec<IssueEvidence>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT id, number, title, author_login, state, labels, created_at, closed_at
                   FROM issues
                   WHERE repo_id = $1
                     AND ((created_at >= $2 AND created_at < $3)
                       OR (closed_at >= $2 AND closed_at < $3))
                   ORDER BY created_at DESC"#,
            )
            .bind(repository_id)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| {
                    let title: Option<String> = row.get("title");
                    let labels: Vec<String> = row.get("labels");
                    IssueEvidence {
                        id: row.get("id"),
                        number: row.get("number"),
                        title: title.clone(),
                        author_login: row.get("author_login"),
                        state: row.get("state"),
                        labels: labels.clone(),
                        created_at: row.get("created_at"),
                        closed_at: row.get("closed_at"),
                        work_type: classify_issue_default(&labels, title.as_deref()),
                    }
                })
                .collect())
        }

        async fn fetch_documentation_changes(
            &self,
            repository_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
        ) -> Result<Vec<DocumentationEvidence>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT path, change_type, commit_sha, occurred_at, is_roadmap, is_adr
                   FROM documentation_changes
                   WHERE repo_id = $1 AND occurred_at >= $2 AND occurred_at < $3"#,
            )
            .bind(repository_id)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| DocumentationEvidence {
                    path: row.get("path"),
                    change_type: row.get("change_type"),
                    commit_sha: row.get("commit_sha"),
                    occurred_at: row.get("occurred_at"),
                    is_roadmap: row.get("is_roadmap"),
                    is_adr: row.get("is_adr"),
                })
                .collect())
        }

        async fn fetch_event_fact_ids(
            &self,
            repo_external_id: &str,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
        ) -> Result<Vec<i64>, sqlx::Error> {
            let rows = sqlx::query(
                r#"SELECT id FROM event_facts
                   WHERE repo_external_id = $1 AND occurred_at >= $2 AND occurred_at < $3"#,
            )
            .bind(repo_external_id)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.iter().map(|r| r.get("id")).collect())
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
    use chrono::TimeZone;

    fn commit(work_type: WorkType, message: &str, merge: bool) -> CommitEvidence {
        CommitEvidence {
            sha: "abc123".to_string(),
            message: Some(message.to_string()),
            author_name: Some("dev".to_string()),
            author_email: Some("dev@example.com".to_string()),
            committed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            work_type,
            is_merge_commit: merge,
        }
    }

    #[test]
    fn merge_commits_are_excluded_from_groupings() {
        let commits = vec![
            commit(WorkType::Bug, "fix: crash on boot", false),
            commit(WorkType::Bug, "Merge pull request #1 from x/fix", true),
        ];
        let groupings = compute_work_type_groupings(&commits, &[], &[]);
        assert_eq!(groupings.len(), 1);
        assert_eq!(groupings[0].commit_count, 1);
    }

    #[test]
    fn empty_groupings_are_skipped() {
        let groupings = compute_work_type_groupings(&[], &[], &[]);
        assert!(groupings.is_empty());
    }

    #[test]
    fn sample_titles_are_capped_at_five() {
        let commits: Vec<CommitEvidence> = (0..8)
            .map(|i| commit(WorkType::Chore, &format!("chore: task {i}"), false))
            .collect();
        let groupings = compute_work_type_groupings(&commits, &[], &[]);
        assert_eq!(groupings[0].sample_titles.len(), 5);
    }

    #[test]
    fn long_commit_messages_are_truncated_to_a_hundred_chars() {
        let long_message = "x".repeat(250);
        let commits = vec![commit(WorkType::Feature, &long_message, false)];
        let groupings = compute_work_type_groupings(&commits, &[], &[]);
        assert_eq!(groupings[0].sample_titles[0].len(), 100);
    }

    #[test]
    fn total_event_count_sums_all_entity_kinds() {
        let bundle = assemble_bundle(
            RepositoryMetadata {
                id: "r1".to_string(),
                owner: "acme".to_string(),
                name: "widget".to_string(),
                default_branch: "main".to_string(),
                estate_id: Some("e1".to_string()),
                documentation_paths: vec![],
            },
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap(),
            vec![],
            vec![commit(WorkType::Feature, "feat: add thing", false)],
            vec![],
            vec![],
            vec![],
            vec![1, 2, 3],
            Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap(),
        );
        assert_eq!(bundle.total_event_count(), 1);
        assert!(!bundle.has_previous_context());
    }
}
